use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The endpoint rejected the call on quota grounds (HTTP 403). Callers
    /// must back off longer than for ordinary network errors.
    #[error("geocoding endpoint rate limited the request")]
    RateLimited,

    #[error("no geocoding result for postal code: {0}")]
    NoResult(String),

    #[error("malformed geocoding response: {0}")]
    MalformedResponse(String),

    #[error("geocoding request failed: {0}")]
    Request(#[from] anyhow::Error),
}

/// One result from the external geocoding endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// Outbound port for the external geocoding lookup.
/// Infrastructure (siphon-geocode) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, postal_code: &str) -> Result<GeocodedPlace, GeocodeError>;
}
