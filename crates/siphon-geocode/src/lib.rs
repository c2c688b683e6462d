//! HTTP client for the postal-code geocoding endpoint.
//!
//! The endpoint answers `GET {api_url}{postal_code}` with a JSON array of
//! candidate places; only the first is consumed. Quota rejections (HTTP 403)
//! are surfaced as a distinct error so callers back off longer than for
//! transient network failures.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use siphon_domain::{GeocodeError, GeocodedPlace, Geocoder};

/// One entry of the endpoint's response array. Coordinates arrive as strings.
#[derive(Debug, Clone, Deserialize)]
struct GeocodeResult {
    lat: String,
    lon: String,
    display_name: String,
}

pub struct GeocodeClient {
    http: reqwest::Client,
    api_url: String,
}

impl GeocodeClient {
    /// Create a new geocoding client.
    ///
    /// An empty URL is a configuration error; startup must not proceed.
    pub fn new(api_url: &str) -> Result<Self, GeocodeError> {
        if api_url.is_empty() {
            return Err(GeocodeError::Request(anyhow!("geocoding API URL is empty")));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GeocodeError::Request(e.into()))?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
        })
    }

    fn first_place(
        results: Vec<GeocodeResult>,
        postal_code: &str,
    ) -> Result<GeocodedPlace, GeocodeError> {
        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoResult(postal_code.to_string()))?;

        let latitude = first.lat.parse::<f64>().map_err(|_| {
            GeocodeError::MalformedResponse(format!("latitude is not numeric: {}", first.lat))
        })?;
        let longitude = first.lon.parse::<f64>().map_err(|_| {
            GeocodeError::MalformedResponse(format!("longitude is not numeric: {}", first.lon))
        })?;

        Ok(GeocodedPlace {
            latitude,
            longitude,
            display_name: first.display_name,
        })
    }
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn lookup(&self, postal_code: &str) -> Result<GeocodedPlace, GeocodeError> {
        let url = format!("{}{}", self.api_url, postal_code);
        debug!(postal_code, "geocoding lookup");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.into()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Request(anyhow!(
                "geocoding endpoint returned status {}",
                status
            )));
        }

        let results: Vec<GeocodeResult> = response
            .json()
            .await
            .map_err(|e| GeocodeError::MalformedResponse(e.to_string()))?;

        Self::first_place(results, postal_code)
    }
}
