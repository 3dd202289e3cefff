use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `[longitude, latitude, altitude]` in degrees / meters.
pub type Position = [f64; 3];

pub const COMMAND_NAVIGATE: u16 = 16;
pub const COMMAND_TAKEOFF: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeMode {
    /// AMSL
    Absolute,
    /// Height above the takeoff point
    Relative,
    /// AGL
    Terrain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointData {
    pub index: usize,
    pub altitude_mode: AltitudeMode,
    pub original_altitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u8>,
    /// Kept for mission fidelity but has no entry in the route geometry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// Route coordinate index of each waypoint, `None` for placeholders.
/// Coordinates are consumed in order by the waypoints that carry one.
pub fn coordinate_slots(waypoints: &[WaypointData]) -> impl Iterator<Item = Option<usize>> + '_ {
    let mut next = 0;
    waypoints.iter().map(move |waypoint| {
        if waypoint.placeholder {
            None
        } else {
            next += 1;
            Some(next - 1)
        }
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<Position> },
    Point { coordinates: Position },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub waypoints: Vec<WaypointData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_coordinates: Option<Vec<Position>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlanFeature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl FlightPlanFeature {
    pub fn line_string(&self) -> Option<&[Position]> {
        match &self.geometry {
            Geometry::LineString { coordinates } => Some(coordinates),
            Geometry::Point { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HomePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Waypoints,
    Geojson,
    Kml,
    Kmz,
}

/// Mission settings carried by the source file. Only DJI missions declare any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PlanConfig {
    Waypoints,
    Geojson,
    Kml,
    Kmz(KmzMissionConfig),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzMissionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_off_security_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_transitional_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_flight_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fly_to_wayline_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rc_lost_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_height_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointsFileInfo {
    pub total_lines: usize,
    pub skipped_lines: usize,
    pub excluded_placeholders: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeoff_altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoJsonFileInfo {
    pub feature_count: usize,
    pub dropped_positions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmlFileInfo {
    pub line_string_count: usize,
    pub dropped_positions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzFileInfo {
    pub template_entry: Option<String>,
    pub waylines_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    pub skipped_placemarks: usize,
}

/// One `<Folder>` (wayline) of a DJI waylines document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wayline_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub placemark_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceMetadata {
    Waypoints {
        file: WaypointsFileInfo,
    },
    Geojson {
        file: GeoJsonFileInfo,
    },
    Kml {
        file: KmlFileInfo,
        /// Sum of `Shape__Length` properties, when the export carried them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance: Option<f64>,
    },
    Kmz {
        file: KmzFileInfo,
        segments: Vec<KmzSegment>,
    },
}

impl SourceMetadata {
    pub fn source(&self) -> PlanSource {
        match self {
            SourceMetadata::Waypoints { .. } => PlanSource::Waypoints,
            SourceMetadata::Geojson { .. } => PlanSource::Geojson,
            SourceMetadata::Kml { .. } => PlanSource::Kml,
            SourceMetadata::Kmz { .. } => PlanSource::Kmz,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub processed: bool,
    #[serde(flatten)]
    pub source: SourceMetadata,
    /// Wall-clock provenance, set once terrain resolution has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlanProperties {
    pub home_position: HomePosition,
    pub config: PlanConfig,
    pub metadata: PlanMetadata,
    /// Kilometers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlanData {
    pub properties: FlightPlanProperties,
    pub features: Vec<FlightPlanFeature>,
    /// Cumulative meters from home, parallel to the waypoint sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoint_distances: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_waypoint_distances: Option<Vec<f64>>,
}

impl FlightPlanData {
    pub fn source(&self) -> PlanSource {
        self.properties.metadata.source.source()
    }

    /// First feature carrying a LineString geometry.
    pub fn route(&self) -> Option<&FlightPlanFeature> {
        self.features
            .iter()
            .find(|feature| feature.line_string().is_some())
    }

    pub fn coordinates(&self) -> &[Position] {
        self.route()
            .and_then(FlightPlanFeature::line_string)
            .unwrap_or(&[])
    }

    pub fn waypoints(&self) -> &[WaypointData] {
        self.route()
            .map(|feature| feature.properties.waypoints.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainAnalysisResult {
    /// Along-route distance of each sample, kilometers.
    pub distances: Vec<f64>,
    pub flight_altitudes: Vec<f64>,
    pub terrain_elevations: Vec<f64>,
    pub minimum_clearance: Option<f64>,
    /// Meters along the route where `minimum_clearance` occurs.
    pub critical_point_distance: Option<f64>,
    pub highest_obstacle: Option<f64>,
}

impl TerrainAnalysisResult {
    pub fn clearances(&self) -> impl Iterator<Item = f64> + '_ {
        self.flight_altitudes
            .iter()
            .zip(&self.terrain_elevations)
            .map(|(flight, terrain)| flight - terrain)
    }
}
