//! Staged processing of a parsed plan: distances first, then terrain
//! resolution of relative and terrain-following altitudes. Each stage takes
//! the previous one by value and hands back a new stage type.

use chrono::Utc;
use shared::{coordinate_slots, AltitudeMode, FlightPlanData, FlightPlanFeature, Geometry};

use crate::distance::{original_waypoint_distances, waypoint_distances};
use crate::error::TerrainAnalysisError;
use crate::oracle::ElevationOracle;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanWithDistances {
    plan: FlightPlanData,
}

impl PlanWithDistances {
    pub fn plan(&self) -> &FlightPlanData {
        &self.plan
    }

    pub fn into_inner(self) -> FlightPlanData {
        self.plan
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPlan {
    plan: FlightPlanData,
}

impl ProcessedPlan {
    pub fn plan(&self) -> &FlightPlanData {
        &self.plan
    }

    pub fn into_inner(self) -> FlightPlanData {
        self.plan
    }
}

pub fn annotate_distances(mut plan: FlightPlanData) -> PlanWithDistances {
    let original = original_waypoint_distances(&plan);
    let current = waypoint_distances(&plan);

    plan.properties.total_distance = Some(original.total_km);
    plan.original_waypoint_distances = Some(original.cumulative_m);
    plan.waypoint_distances = Some(current.cumulative_m);

    tracing::debug!(
        "annotated {} waypoints, total {:.3} km",
        plan.waypoints().len(),
        original.total_km
    );
    PlanWithDistances { plan }
}

/// Rewrites route altitudes to absolute: terrain-following waypoints sit on
/// the ground below them, relative ones on the ground below home.
/// Placeholder waypoints own no coordinate and are left as parsed.
pub async fn resolve_terrain<O: ElevationOracle>(
    stage: PlanWithDistances,
    oracle: &O,
) -> Result<ProcessedPlan, TerrainAnalysisError> {
    let mut plan = stage.plan;
    oracle.wait_until_ready().await?;

    let needs_home = plan
        .waypoints()
        .iter()
        .any(|w| w.altitude_mode == AltitudeMode::Relative);
    let home_ground = if needs_home {
        let home = plan.properties.home_position;
        ground_elevation(oracle, home.longitude, home.latitude).await
    } else {
        0.0
    };

    let mut resolved = 0usize;
    let route = plan
        .features
        .iter_mut()
        .find(|feature| feature.line_string().is_some());
    if let Some(FlightPlanFeature {
        geometry: Geometry::LineString { coordinates },
        properties,
    }) = route
    {
        let slots: Vec<Option<usize>> = coordinate_slots(&properties.waypoints).collect();
        for (waypoint, slot) in properties.waypoints.iter_mut().zip(slots) {
            let Some(position) = slot.and_then(|slot| coordinates.get_mut(slot)) else {
                continue;
            };
            let base = match waypoint.altitude_mode {
                AltitudeMode::Absolute => continue,
                AltitudeMode::Relative => home_ground,
                AltitudeMode::Terrain => ground_elevation(oracle, position[0], position[1]).await,
            };
            position[2] = base + waypoint.original_altitude;
            waypoint.altitude_mode = AltitudeMode::Absolute;
            resolved += 1;
        }
    }

    plan.properties.metadata.processed = true;
    plan.properties.metadata.processed_at = Some(Utc::now());

    tracing::info!("resolved {} waypoint altitudes to absolute", resolved);
    Ok(ProcessedPlan { plan })
}

async fn ground_elevation<O: ElevationOracle>(oracle: &O, lon: f64, lat: f64) -> f64 {
    match oracle.query_elevation(lon, lat).await {
        Ok(Some(elevation)) => elevation,
        Ok(None) => {
            tracing::warn!("no ground elevation at ({lon:.6}, {lat:.6}), using 0");
            0.0
        }
        Err(err) => {
            tracing::warn!("ground elevation at ({lon:.6}, {lat:.6}) failed: {err}");
            0.0
        }
    }
}
