//! Ground elevation sources consumed by terrain analysis.

pub mod dem;
pub mod http;

use std::future::Future;

use thiserror::Error;

pub use dem::{ArcAsciiDem, DemLoadError, DemOracle};
pub use http::HttpElevationOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("elevation source is not ready")]
    NotReady,
    #[error("elevation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("elevation provider returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Dem(#[from] DemLoadError),
    #[error("elevation loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A source of ground elevation in meters for a `(lon, lat)` pair.
///
/// `Ok(None)` means the point is not covered; callers treat it as 0.
pub trait ElevationOracle: Send + Sync {
    fn is_ready(&self) -> bool;

    fn wait_until_ready(&self) -> impl Future<Output = Result<(), OracleError>> + Send {
        async move {
            if self.is_ready() {
                Ok(())
            } else {
                Err(OracleError::NotReady)
            }
        }
    }

    fn query_elevation(
        &self,
        lon: f64,
        lat: f64,
    ) -> impl Future<Output = Result<Option<f64>, OracleError>> + Send;
}

/// Same answer everywhere. `None` simulates a source with no coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstantOracle {
    pub elevation: Option<f64>,
}

impl ConstantOracle {
    pub fn new(elevation: f64) -> Self {
        Self {
            elevation: Some(elevation),
        }
    }

    pub fn uncovered() -> Self {
        Self { elevation: None }
    }
}

impl ElevationOracle for ConstantOracle {
    fn is_ready(&self) -> bool {
        true
    }

    async fn query_elevation(&self, _lon: f64, _lat: f64) -> Result<Option<f64>, OracleError> {
        Ok(self.elevation)
    }
}

/// Runtime-selected oracle for the CLI.
#[derive(Debug)]
pub enum AnyOracle {
    Dem(DemOracle),
    Http(HttpElevationOracle),
    Constant(ConstantOracle),
}

impl ElevationOracle for AnyOracle {
    fn is_ready(&self) -> bool {
        match self {
            AnyOracle::Dem(oracle) => oracle.is_ready(),
            AnyOracle::Http(oracle) => oracle.is_ready(),
            AnyOracle::Constant(oracle) => oracle.is_ready(),
        }
    }

    async fn wait_until_ready(&self) -> Result<(), OracleError> {
        match self {
            AnyOracle::Dem(oracle) => oracle.wait_until_ready().await,
            AnyOracle::Http(oracle) => oracle.wait_until_ready().await,
            AnyOracle::Constant(oracle) => oracle.wait_until_ready().await,
        }
    }

    async fn query_elevation(&self, lon: f64, lat: f64) -> Result<Option<f64>, OracleError> {
        match self {
            AnyOracle::Dem(oracle) => oracle.query_elevation(lon, lat).await,
            AnyOracle::Http(oracle) => oracle.query_elevation(lon, lat).await,
            AnyOracle::Constant(oracle) => oracle.query_elevation(lon, lat).await,
        }
    }
}
