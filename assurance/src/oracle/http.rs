use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::{ElevationOracle, OracleError};

pub const DEFAULT_ELEVATION_API_URL: &str = "https://api.open-meteo.com/v1/elevation";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    elevation: Option<Vec<f64>>,
}

/// Open-Meteo compatible elevation API, one request per point.
#[derive(Debug, Clone)]
pub struct HttpElevationOracle {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpElevationOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for HttpElevationOracle {
    fn default() -> Self {
        Self::new(DEFAULT_ELEVATION_API_URL)
    }
}

impl ElevationOracle for HttpElevationOracle {
    fn is_ready(&self) -> bool {
        true
    }

    async fn query_elevation(&self, lon: f64, lat: f64) -> Result<Option<f64>, OracleError> {
        let url = build_provider_url(&self.base_url, lat, lon);
        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(OracleError::Status(response.status()));
        }

        let payload: ElevationResponse = response.json().await?;
        Ok(first_elevation(payload))
    }
}

fn build_provider_url(base: &str, lat: f64, lon: f64) -> String {
    let separator = if base.contains('?') { "&" } else { "?" };
    format!("{base}{separator}latitude={lat:.6}&longitude={lon:.6}")
}

fn first_elevation(payload: ElevationResponse) -> Option<f64> {
    payload
        .elevation?
        .into_iter()
        .next()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_urls() {
        assert_eq!(
            build_provider_url(DEFAULT_ELEVATION_API_URL, -33.8688, 151.2093),
            "https://api.open-meteo.com/v1/elevation?latitude=-33.868800&longitude=151.209300"
        );
        assert_eq!(
            build_provider_url("http://localhost:8080/elev?key=abc", 1.0, 2.0),
            "http://localhost:8080/elev?key=abc&latitude=1.000000&longitude=2.000000"
        );
    }

    #[test]
    fn decodes_first_elevation() {
        let payload: ElevationResponse = serde_json::from_str(r#"{"elevation":[58.0]}"#).unwrap();
        assert_eq!(first_elevation(payload), Some(58.0));

        let empty: ElevationResponse = serde_json::from_str(r#"{"elevation":[]}"#).unwrap();
        assert_eq!(first_elevation(empty), None);

        let missing: ElevationResponse = serde_json::from_str(r#"{"error":true}"#).unwrap();
        assert_eq!(first_elevation(missing), None);
    }

    #[test]
    fn default_points_at_open_meteo() {
        let oracle = HttpElevationOracle::default();
        assert!(oracle.is_ready());
        assert_eq!(oracle.base_url(), DEFAULT_ELEVATION_API_URL);
    }
}
