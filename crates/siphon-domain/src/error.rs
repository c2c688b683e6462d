use thiserror::Error;

use crate::geocoder::GeocodeError;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("no topic setting registered for topic: {0}")]
    SettingNotFound(String),

    #[error("payload decode failed: {0}")]
    Payload(#[from] siphon_payload::PayloadError),

    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl DomainError {
    /// Whether the caller should back off longer than for transient errors.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DomainError::Geocode(GeocodeError::RateLimited))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
