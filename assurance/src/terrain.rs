//! Terrain clearance along a flight route.
//!
//! The route is walked at a fixed interval, each sample is checked against an
//! [`ElevationOracle`], and the resulting profile is reduced to a minimum
//! clearance, where it happens, and the highest ground encountered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt, TryStreamExt};
use geo_types::Coord;
use shared::{FlightPlanData, Position, TerrainAnalysisResult};

use crate::error::TerrainAnalysisError;
use crate::geo::{horizontal_line, line_length_m, nearest_point_on_line, point_along};
use crate::oracle::ElevationOracle;

pub const DEFAULT_SAMPLE_INTERVAL_M: f64 = 10.0;
pub const DEFAULT_QUERY_CONCURRENCY: usize = 8;
pub const DEFAULT_QUERY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    pub interval_m: f64,
    /// Add a final sample at the route end when the length is not a
    /// multiple of the interval.
    pub include_endpoint: bool,
    pub concurrency: usize,
    /// Pause before each oracle query.
    pub query_delay: Duration,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            interval_m: DEFAULT_SAMPLE_INTERVAL_M,
            include_endpoint: false,
            concurrency: DEFAULT_QUERY_CONCURRENCY,
            query_delay: DEFAULT_QUERY_DELAY,
        }
    }
}

/// Cooperative cancellation shared between the caller and a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSample {
    pub distance_m: f64,
    pub position: Coord<f64>,
    pub flight_altitude: f64,
}

/// Samples at `k * interval` for every `k * interval <= length`. A route of
/// zero length has no samples.
pub fn sample_route(route: &[Position], options: &SamplingOptions) -> Vec<RouteSample> {
    let interval = options.interval_m;
    if !(interval.is_finite() && interval > 0.0) {
        tracing::warn!("sampling interval {} is not positive, no samples taken", interval);
        return Vec::new();
    }

    let line = horizontal_line(route);
    let length = line_length_m(&line);
    if !(length.is_finite() && length > 0.0) {
        return Vec::new();
    }

    let steps = (length / interval).floor() as usize;
    let mut distances: Vec<f64> = (0..=steps).map(|k| k as f64 * interval).collect();
    if options.include_endpoint && distances.last().is_some_and(|last| length - last > 1e-9) {
        distances.push(length);
    }

    distances
        .into_iter()
        .filter_map(|distance_m| {
            let position = point_along(&line, distance_m)?;
            let nearest = nearest_point_on_line(&line, position)?;
            Some(RouteSample {
                distance_m,
                position,
                flight_altitude: route[nearest.index][2],
            })
        })
        .collect()
}

/// Reduce sampled flight altitudes and ground elevations, in route order.
pub fn clearance_profile(samples: &[RouteSample], elevations: &[f64]) -> TerrainAnalysisResult {
    let mut result = TerrainAnalysisResult::default();

    for (sample, &terrain) in samples.iter().zip(elevations) {
        let clearance = sample.flight_altitude - terrain;
        if result.minimum_clearance.map_or(true, |min| clearance < min) {
            result.minimum_clearance = Some(clearance);
            result.critical_point_distance = Some(sample.distance_m);
        }
        if result.highest_obstacle.map_or(true, |max| terrain > max) {
            result.highest_obstacle = Some(terrain);
        }

        result.distances.push(sample.distance_m / 1000.0);
        result.flight_altitudes.push(sample.flight_altitude);
        result.terrain_elevations.push(terrain);
    }

    result
}

pub async fn analyze_terrain<O: ElevationOracle>(
    plan: &FlightPlanData,
    oracle: &O,
    options: &SamplingOptions,
    cancel: &CancellationFlag,
) -> Result<TerrainAnalysisResult, TerrainAnalysisError> {
    let route = plan
        .route()
        .and_then(|feature| feature.line_string())
        .ok_or(TerrainAnalysisError::NoLineString)?;
    if route.len() < 2 {
        return Err(TerrainAnalysisError::InvalidFlightPlan(format!(
            "route has {} coordinate(s), at least 2 required",
            route.len()
        )));
    }

    let samples = sample_route(route, options);
    tracing::debug!(
        "sampling {} points every {} m",
        samples.len(),
        options.interval_m
    );

    if !oracle.is_ready() {
        tracing::debug!("waiting for elevation source");
    }
    oracle.wait_until_ready().await?;

    let elevations = query_elevations(&samples, oracle, options, cancel).await?;
    let result = clearance_profile(&samples, &elevations);

    tracing::info!(
        "terrain analysis: {} samples, minimum clearance {:?} m at {:?} m",
        samples.len(),
        result.minimum_clearance,
        result.critical_point_distance
    );
    Ok(result)
}

/// Fan out oracle queries with bounded concurrency; results keep route order.
async fn query_elevations<O: ElevationOracle>(
    samples: &[RouteSample],
    oracle: &O,
    options: &SamplingOptions,
    cancel: &CancellationFlag,
) -> Result<Vec<f64>, TerrainAnalysisError> {
    let delay = options.query_delay;

    stream::iter(samples.iter().copied())
        .map(|sample| async move {
            if cancel.is_cancelled() {
                return Err(TerrainAnalysisError::Cancelled);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                if cancel.is_cancelled() {
                    return Err(TerrainAnalysisError::Cancelled);
                }
            }

            let Coord { x: lon, y: lat } = sample.position;
            let elevation = match oracle.query_elevation(lon, lat).await {
                Ok(Some(elevation)) => elevation,
                Ok(None) => {
                    tracing::debug!("no elevation at ({lon:.6}, {lat:.6}), using 0");
                    0.0
                }
                Err(err) => {
                    tracing::warn!("elevation query at ({lon:.6}, {lat:.6}) failed: {err}");
                    0.0
                }
            };
            Ok(elevation)
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await
}
