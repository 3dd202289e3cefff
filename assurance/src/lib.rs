pub mod config;
pub mod distance;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod home;
pub mod oracle;
pub mod parsers;
pub mod pipeline;
pub mod terrain;

pub use crate::config::{AnalysisConfig, ConfigError};
pub use crate::error::{ExportError, ParseError, TerrainAnalysisError};
pub use crate::oracle::{ElevationOracle, OracleError};
pub use crate::parsers::{parse_flight_plan, FlightPlanFormat};
pub use crate::pipeline::{annotate_distances, resolve_terrain, PlanWithDistances, ProcessedPlan};
pub use crate::terrain::{analyze_terrain, CancellationFlag, SamplingOptions};
