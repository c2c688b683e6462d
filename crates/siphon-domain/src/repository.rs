use async_trait::async_trait;

use crate::error::DomainResult;
use crate::types::{CoordinateMapping, DataPoint, NewCoordinateMapping, TopicSetting};

/// Repository trait for the configured sensor feeds.
/// Infrastructure layer (siphon-postgres) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TopicSettingRepository: Send + Sync {
    /// All configured feeds, read once at subscribe time.
    async fn list_topic_settings(&self) -> DomainResult<Vec<TopicSetting>>;
}

/// Repository trait for coordinate mappings and the leasing protocol.
/// Infrastructure layer (siphon-postgres) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CoordinateMappingRepository: Send + Sync {
    async fn find_mapping(&self, postal_code: &str) -> DomainResult<Option<CoordinateMapping>>;

    /// Insert a mapping unless the postal code already has one.
    ///
    /// Returns `true` when this call created the row, `false` when a
    /// concurrent creator won the race. This is the compare-and-swap claim
    /// that keeps duplicate creation out without a process-local lock.
    async fn insert_mapping_if_absent(
        &self,
        mapping: &NewCoordinateMapping,
    ) -> DomainResult<bool>;

    /// Claim exclusive, time-boxed ownership of one available row.
    ///
    /// Selects one row whose lease is absent or expired, never-used rows
    /// first, skipping rows locked by concurrent transactions, and stamps
    /// `last_used`/`locked_until` before committing. `None` is the expected
    /// steady state when every row is currently owned.
    async fn acquire_lease(&self) -> DomainResult<Option<CoordinateMapping>>;

    /// Persist refreshed geocoding results for an existing row.
    async fn update_coordinates(
        &self,
        postal_code: &str,
        location: &str,
        latitude: f64,
        longitude: f64,
    ) -> DomainResult<()>;
}

/// Outbound port for time-series writes.
/// Infrastructure layer (siphon-clickhouse) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn write_point(&self, point: &DataPoint) -> DomainResult<()>;
}
