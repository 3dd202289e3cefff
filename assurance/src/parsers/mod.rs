//! Flight plan file parsers. Each parser turns one serialized format into a
//! fresh [`FlightPlanData`] with `processed == false`, or fails with a
//! [`ParseError`] before building anything.

pub mod geojson;
pub mod kml;
pub mod kmz;
pub mod qgc;
pub(crate) mod xml;

use std::path::Path;

use shared::{
    FeatureProperties, FlightPlanData, FlightPlanFeature, FlightPlanProperties, Geometry,
    HomePosition, PlanConfig, PlanMetadata, Position, SourceMetadata, WaypointData,
};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPlanFormat {
    Waypoints,
    GeoJson,
    Kml,
    Kmz,
}

impl FlightPlanFormat {
    pub fn from_file_name(name: &str) -> Result<Self, ParseError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "waypoints" => Ok(Self::Waypoints),
            "geojson" | "json" => Ok(Self::GeoJson),
            "kml" => Ok(Self::Kml),
            "kmz" => Ok(Self::Kmz),
            _ => Err(ParseError::UnsupportedExtension(extension)),
        }
    }
}

/// Route a raw upload to the parser matching its file extension.
pub fn parse_flight_plan(file_name: &str, bytes: &[u8]) -> Result<FlightPlanData, ParseError> {
    let format = FlightPlanFormat::from_file_name(file_name)?;
    tracing::debug!("parsing {} ({} bytes) as {:?}", file_name, bytes.len(), format);

    let plan = match format {
        FlightPlanFormat::Waypoints => qgc::parse(decode_text(bytes)?)?,
        FlightPlanFormat::GeoJson => geojson::parse(decode_text(bytes)?)?,
        FlightPlanFormat::Kml => kml::parse(decode_text(bytes)?)?,
        FlightPlanFormat::Kmz => kmz::parse(&kmz::KmzArchive::from_bytes(bytes)?)?,
    };

    tracing::info!(
        "parsed {} into {} waypoints / {} coordinates",
        file_name,
        plan.waypoints().len(),
        plan.coordinates().len()
    );
    Ok(plan)
}

fn decode_text(bytes: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Everything a parser extracted, before it becomes a [`FlightPlanData`].
pub(crate) struct PlanParts {
    pub coordinates: Vec<Position>,
    pub waypoints: Vec<WaypointData>,
    pub home_position: HomePosition,
    pub config: PlanConfig,
    pub metadata: SourceMetadata,
}

impl PlanParts {
    pub fn into_plan(self) -> Result<FlightPlanData, ParseError> {
        if self.coordinates.is_empty() {
            return Err(ParseError::NoCoordinates);
        }

        let feature = FlightPlanFeature {
            properties: FeatureProperties {
                waypoints: self.waypoints,
                original_coordinates: Some(self.coordinates.clone()),
            },
            geometry: Geometry::LineString {
                coordinates: self.coordinates,
            },
        };

        Ok(FlightPlanData {
            properties: FlightPlanProperties {
                home_position: self.home_position,
                config: self.config,
                metadata: PlanMetadata {
                    processed: false,
                    source: self.metadata,
                    processed_at: None,
                },
                total_distance: None,
            },
            features: vec![feature],
            waypoint_distances: None,
            original_waypoint_distances: None,
        })
    }
}

/// Absolute-mode navigate waypoints, one per coordinate. Used by the formats
/// that carry no per-waypoint altitude semantics.
pub(crate) fn navigate_waypoints(coordinates: &[Position]) -> Vec<WaypointData> {
    coordinates
        .iter()
        .enumerate()
        .map(|(index, position)| WaypointData {
            index,
            altitude_mode: shared::AltitudeMode::Absolute,
            original_altitude: position[2],
            command_type: Some(shared::COMMAND_NAVIGATE),
            frame: Some(0),
            placeholder: false,
        })
        .collect()
}
