use crate::core::{Coordinate, GeocodeProvider};
use crate::utils::error::{GeoError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = concat!("postcode-geocoder/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a Nominatim-compatible `/search` endpoint.
pub struct NominatimProvider {
    client: Client,
    search_url: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: Degrees,
    lon: Degrees,
}

// Nominatim sends degrees as strings; some mirrors send plain numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Text(String),
    Number(f64),
}

impl Degrees {
    fn value(&self) -> Option<f64> {
        match self {
            Degrees::Text(s) => s.trim().parse().ok(),
            Degrees::Number(n) => Some(*n),
        }
    }
}

impl NominatimProvider {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            search_url: format!("{}/search", endpoint.trim_end_matches('/')),
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinate>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeoError::transient(format!("request failed: {}", e)))?;

        let status = response.status();
        tracing::debug!("Provider response status: {}", status);
        if !status.is_success() {
            return Err(GeoError::transient(format!("provider returned HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeoError::transient(format!("failed to read response: {}", e)))?;
        let places: Vec<Place> = serde_json::from_str(&body)
            .map_err(|e| GeoError::transient(format!("malformed payload: {}", e)))?;

        let Some(place) = places.first() else {
            return Ok(None);
        };

        match (place.lat.value(), place.lon.value()) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).map(Some).ok_or_else(|| {
                GeoError::transient(format!("malformed payload: invalid point ({}, {})", lat, lon))
            }),
            _ => Err(GeoError::transient("malformed payload: unreadable coordinates")),
        }
    }
}
