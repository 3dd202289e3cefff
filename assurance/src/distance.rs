use geo_types::Coord;
use shared::{coordinate_slots, FlightPlanData, Position, WaypointData};

use crate::geo::haversine_m;

#[derive(Debug, Clone, PartialEq)]
pub struct WaypointDistances {
    /// Cumulative meters from the first waypoint, one entry per waypoint.
    pub cumulative_m: Vec<f64>,
    pub total_km: f64,
}

/// Cumulative great-circle distance per waypoint over `coordinates`.
/// Waypoints consume coordinates in order, placeholders take none and repeat
/// the previous value. A malformed segment (missing coordinate, non-finite
/// component) also keeps the previous cumulative value.
pub fn accumulate(coordinates: &[Position], waypoints: &[WaypointData]) -> WaypointDistances {
    let mut cumulative_m = Vec::with_capacity(waypoints.len());
    let mut total_m = 0.0;
    let mut skipped = 0usize;
    let mut previous: Option<(usize, Option<Coord<f64>>)> = None;

    for (index, slot) in coordinate_slots(waypoints).enumerate() {
        if let Some(slot) = slot {
            let current = horizontal(coordinates.get(slot));
            if let Some((from, start)) = previous {
                match (start, current) {
                    (Some(start), Some(end)) => total_m += haversine_m(start, end),
                    _ => {
                        skipped += 1;
                        tracing::warn!("skipping malformed segment {} -> {}", from, index);
                    }
                }
            }
            previous = Some((index, current));
        }
        cumulative_m.push(total_m);
    }

    if skipped > 0 {
        tracing::debug!(
            "distance accumulation skipped {} of {} waypoints",
            skipped,
            waypoints.len()
        );
    }

    WaypointDistances {
        cumulative_m,
        total_km: total_m / 1000.0,
    }
}

/// Distances against the pre-normalization coordinates when the plan kept
/// them, otherwise against the route geometry.
pub fn original_waypoint_distances(plan: &FlightPlanData) -> WaypointDistances {
    let original = plan
        .route()
        .and_then(|feature| feature.properties.original_coordinates.as_deref());
    accumulate(original.unwrap_or(plan.coordinates()), plan.waypoints())
}

pub fn waypoint_distances(plan: &FlightPlanData) -> WaypointDistances {
    accumulate(plan.coordinates(), plan.waypoints())
}

fn horizontal(position: Option<&Position>) -> Option<Coord<f64>> {
    let [lon, lat, _] = *position?;
    (lon.is_finite() && lat.is_finite()).then_some(Coord { x: lon, y: lat })
}
