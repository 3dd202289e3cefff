//! Analysis configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::terrain::SamplingOptions;

pub const DEM_PATH_VAR: &str = "FLIGHT_DEM_PATH";
pub const ELEVATION_API_URL_VAR: &str = "ELEVATION_API_URL";
pub const SAMPLE_INTERVAL_VAR: &str = "TERRAIN_SAMPLE_INTERVAL_M";
pub const QUERY_CONCURRENCY_VAR: &str = "TERRAIN_QUERY_CONCURRENCY";
pub const QUERY_DELAY_VAR: &str = "TERRAIN_QUERY_DELAY_MS";
pub const INCLUDE_ENDPOINT_VAR: &str = "TERRAIN_INCLUDE_ENDPOINT";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value `{value}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("sampling interval must be a positive number of meters, got {0}")]
    NonPositiveInterval(f64),
    #[error("query concurrency must be at least 1")]
    ZeroConcurrency,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisConfig {
    pub dem_path: Option<PathBuf>,
    pub elevation_api_url: Option<String>,
    pub sampling: SamplingOptions,
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SamplingOptions::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let interval_m = match non_empty(SAMPLE_INTERVAL_VAR) {
            Some(raw) => parse(SAMPLE_INTERVAL_VAR, &raw)?,
            None => defaults.interval_m,
        };
        let concurrency = match non_empty(QUERY_CONCURRENCY_VAR) {
            Some(raw) => parse(QUERY_CONCURRENCY_VAR, &raw)?,
            None => defaults.concurrency,
        };
        let query_delay = match non_empty(QUERY_DELAY_VAR) {
            Some(raw) => Duration::from_millis(parse(QUERY_DELAY_VAR, &raw)?),
            None => defaults.query_delay,
        };
        let include_endpoint = match non_empty(INCLUDE_ENDPOINT_VAR) {
            Some(raw) => parse_flag(INCLUDE_ENDPOINT_VAR, &raw)?,
            None => defaults.include_endpoint,
        };

        let config = Self {
            dem_path: non_empty(DEM_PATH_VAR).map(PathBuf::from),
            elevation_api_url: non_empty(ELEVATION_API_URL_VAR),
            sampling: SamplingOptions {
                interval_m,
                include_endpoint,
                concurrency,
                query_delay,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.sampling.interval_m;
        if !(interval.is_finite() && interval > 0.0) {
            return Err(ConfigError::NonPositiveInterval(interval));
        }
        if self.sampling.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
