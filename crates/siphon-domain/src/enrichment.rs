use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DomainResult;
use crate::geocoder::Geocoder;
use crate::repository::CoordinateMappingRepository;
use crate::types::NewCoordinateMapping;

/// Extract the short location label from a geocoder display name.
///
/// Display names look like "89518, Reno, Washoe County, Nevada, USA"; the
/// second comma-separated segment is the place name.
fn location_label(display_name: &str) -> String {
    let mut segments = display_name.split(',').map(str::trim);
    let first = segments.next().unwrap_or(display_name);
    segments.next().unwrap_or(first).to_string()
}

/// Domain service around the external geocoding lookup.
pub struct EnrichmentService {
    mappings: Arc<dyn CoordinateMappingRepository>,
    geocoder: Arc<dyn Geocoder>,
}

impl EnrichmentService {
    pub fn new(
        mappings: Arc<dyn CoordinateMappingRepository>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self { mappings, geocoder }
    }

    /// Make sure a coordinate mapping exists for `postal_code`.
    ///
    /// Idempotent: an existing mapping is a no-op. Creation is claimed with
    /// an insert-if-absent, so two concurrent callers produce exactly one
    /// row; the loser of the race observes the winner's row and no-ops.
    pub async fn ensure_coordinates(&self, postal_code: &str) -> DomainResult<()> {
        if self.mappings.find_mapping(postal_code).await?.is_some() {
            debug!(postal_code, "coordinate mapping already exists");
            return Ok(());
        }

        let place = self.geocoder.lookup(postal_code).await?;
        let mapping = NewCoordinateMapping {
            postal_code: postal_code.to_string(),
            location: location_label(&place.display_name),
            latitude: place.latitude,
            longitude: place.longitude,
        };

        if self.mappings.insert_mapping_if_absent(&mapping).await? {
            info!(
                postal_code,
                location = %mapping.location,
                "created coordinate mapping"
            );
        } else {
            debug!(postal_code, "mapping created concurrently, keeping theirs");
        }

        Ok(())
    }

    /// One worker cycle: lease a row and refresh its coordinates.
    ///
    /// Returns `false` when no row was available for lease, the expected
    /// steady state while every row is owned or recently refreshed. The
    /// lease is never explicitly released; it lapses on its own.
    pub async fn refresh_one(&self) -> DomainResult<bool> {
        let Some(leased) = self.mappings.acquire_lease().await? else {
            return Ok(false);
        };

        debug!(postal_code = %leased.postal_code, "leased mapping for refresh");

        let place = self.geocoder.lookup(&leased.postal_code).await?;
        self.mappings
            .update_coordinates(
                &leased.postal_code,
                &location_label(&place.display_name),
                place.latitude,
                place.longitude,
            )
            .await?;

        info!(postal_code = %leased.postal_code, "refreshed coordinate mapping");
        Ok(true)
    }
}

/// Periodic wrapper around `EnrichmentService::refresh_one`.
///
/// Every error is confined to its cycle; a rate-limit response stretches the
/// wait before the next attempt well beyond the ordinary interval.
pub struct EnrichmentWorker {
    service: Arc<EnrichmentService>,
    interval: Duration,
    rate_limit_backoff: Duration,
}

impl EnrichmentWorker {
    pub fn new(
        service: Arc<EnrichmentService>,
        interval: Duration,
        rate_limit_backoff: Duration,
    ) -> Self {
        Self {
            service,
            interval,
            rate_limit_backoff,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<(), anyhow::Error> {
        info!(
            interval_secs = self.interval.as_secs(),
            "starting enrichment worker"
        );

        loop {
            let wait = match self.service.refresh_one().await {
                Ok(refreshed) => {
                    if refreshed {
                        debug!("enrichment cycle refreshed one mapping");
                    }
                    self.interval
                }
                Err(e) if e.is_rate_limited() => {
                    warn!(
                        backoff_secs = self.rate_limit_backoff.as_secs(),
                        "geocoding quota exhausted, backing off"
                    );
                    self.rate_limit_backoff
                }
                Err(e) => {
                    warn!(error = %e, "enrichment cycle failed, retrying next cycle");
                    self.interval
                }
            };

            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("enrichment worker stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::geocoder::{GeocodeError, GeocodedPlace, MockGeocoder};
    use crate::repository::MockCoordinateMappingRepository;
    use crate::types::CoordinateMapping;
    use crate::DomainError;

    fn reno_place() -> GeocodedPlace {
        GeocodedPlace {
            latitude: 39.5296,
            longitude: -119.8138,
            display_name: "89518, Reno, Washoe County, Nevada, USA".to_string(),
        }
    }

    fn reno_mapping() -> CoordinateMapping {
        CoordinateMapping {
            postal_code: "89518".to_string(),
            location: "Reno".to_string(),
            latitude: 39.5296,
            longitude: -119.8138,
            last_used: None,
            locked_until: Some(Utc::now() + chrono::Duration::minutes(1)),
        }
    }

    #[test]
    fn test_location_label_takes_second_segment() {
        assert_eq!(
            location_label("89518, Reno, Washoe County, Nevada, USA"),
            "Reno"
        );
    }

    #[test]
    fn test_location_label_single_segment_falls_back() {
        assert_eq!(location_label("Reno"), "Reno");
    }

    #[tokio::test]
    async fn test_ensure_coordinates_noop_when_mapping_exists() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_find_mapping()
            .times(1)
            .returning(|_| Ok(Some(reno_mapping())));
        mappings.expect_insert_mapping_if_absent().times(0);

        let mut geocoder = MockGeocoder::new();
        geocoder.expect_lookup().times(0);

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        service.ensure_coordinates("89518").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_coordinates_creates_missing_mapping() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_find_mapping()
            .times(1)
            .returning(|_| Ok(None));
        mappings
            .expect_insert_mapping_if_absent()
            .withf(|mapping: &NewCoordinateMapping| {
                mapping.postal_code == "89518"
                    && mapping.location == "Reno"
                    && (mapping.latitude - 39.5296).abs() < f64::EPSILON
                    && (mapping.longitude + 119.8138).abs() < f64::EPSILON
            })
            .times(1)
            .returning(|_| Ok(true));

        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_lookup()
            .withf(|postal_code: &str| postal_code == "89518")
            .times(1)
            .returning(|_| Ok(reno_place()));

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        service.ensure_coordinates("89518").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creation_results_in_single_row() {
        // Two callers race: both miss the lookup, one wins the insert claim.
        // Exactly one row exists afterward and neither call fails.
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_find_mapping()
            .times(2)
            .returning(|_| Ok(None));
        let mut claimed = false;
        mappings
            .expect_insert_mapping_if_absent()
            .times(2)
            .returning(move |_| {
                if claimed {
                    Ok(false)
                } else {
                    claimed = true;
                    Ok(true)
                }
            });

        let mut geocoder = MockGeocoder::new();
        geocoder.expect_lookup().returning(|_| Ok(reno_place()));

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        service.ensure_coordinates("89518").await.unwrap();
        service.ensure_coordinates("89518").await.unwrap();
    }

    #[tokio::test]
    async fn test_second_caller_observes_existing_row_without_lookup() {
        let mut mappings = MockCoordinateMappingRepository::new();
        let mut call = 0;
        mappings.expect_find_mapping().times(2).returning(move |_| {
            call += 1;
            if call == 1 {
                Ok(None)
            } else {
                Ok(Some(reno_mapping()))
            }
        });
        mappings
            .expect_insert_mapping_if_absent()
            .times(1)
            .returning(|_| Ok(true));

        let mut geocoder = MockGeocoder::new();
        // Exactly one outbound call across both invocations.
        geocoder
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(reno_place()));

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        service.ensure_coordinates("89518").await.unwrap();
        service.ensure_coordinates("89518").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_is_distinguishable() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_find_mapping()
            .times(1)
            .returning(|_| Ok(None));

        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_lookup()
            .times(1)
            .returning(|_| Err(GeocodeError::RateLimited));

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        let result = service.ensure_coordinates("89518").await;

        assert!(matches!(
            result,
            Err(DomainError::Geocode(GeocodeError::RateLimited))
        ));
        assert!(result.unwrap_err().is_rate_limited());
    }

    #[tokio::test]
    async fn test_refresh_one_noop_without_lease() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_acquire_lease()
            .times(1)
            .returning(|| Ok(None));
        mappings.expect_update_coordinates().times(0);

        let mut geocoder = MockGeocoder::new();
        geocoder.expect_lookup().times(0);

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        assert!(!service.refresh_one().await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_one_updates_leased_row() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings
            .expect_acquire_lease()
            .times(1)
            .returning(|| Ok(Some(reno_mapping())));
        mappings
            .expect_update_coordinates()
            .withf(|postal_code: &str, location: &str, _lat: &f64, _lon: &f64| {
                postal_code == "89518" && location == "Reno"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_lookup()
            .withf(|postal_code: &str| postal_code == "89518")
            .times(1)
            .returning(|_| Ok(reno_place()));

        let service = EnrichmentService::new(Arc::new(mappings), Arc::new(geocoder));

        assert!(service.refresh_one().await.unwrap());
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancellation() {
        let mut mappings = MockCoordinateMappingRepository::new();
        mappings.expect_acquire_lease().returning(|| Ok(None));

        let geocoder = MockGeocoder::new();
        let service = Arc::new(EnrichmentService::new(
            Arc::new(mappings),
            Arc::new(geocoder),
        ));

        let worker = EnrichmentWorker::new(
            service,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        let token = CancellationToken::new();
        token.cancel();

        worker.run(token).await.unwrap();
    }
}
