use serde::Deserialize;
use serde_json::Value;
use shared::{FlightPlanData, GeoJsonFileInfo, PlanConfig, Position, SourceMetadata};

use super::{navigate_waypoints, PlanParts};
use crate::error::ParseError;
use crate::home::infer_home_position;

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

pub fn parse(content: &str) -> Result<FlightPlanData, ParseError> {
    let collection: RawFeatureCollection = serde_json::from_str(content)?;
    if collection.features.is_empty() {
        return Err(ParseError::NoFeatures);
    }

    let (feature, geometry) = collection
        .features
        .iter()
        .find_map(|feature| {
            feature
                .geometry
                .as_ref()
                .filter(|geometry| geometry.kind == "LineString")
                .map(|geometry| (feature, geometry))
        })
        .ok_or(ParseError::NoLineString)?;

    let (coordinates, dropped_positions) = retain_3d_positions(&geometry.coordinates)?;
    if dropped_positions > 0 {
        tracing::debug!("dropped {} positions without altitude", dropped_positions);
    }

    let name = feature
        .properties
        .as_ref()
        .and_then(|props| props.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    PlanParts {
        waypoints: navigate_waypoints(&coordinates),
        home_position: infer_home_position(&coordinates),
        coordinates,
        config: PlanConfig::Geojson,
        metadata: SourceMetadata::Geojson {
            file: GeoJsonFileInfo {
                feature_count: collection.features.len(),
                dropped_positions,
                name,
            },
        },
    }
    .into_plan()
}

/// Keeps `[lon, lat, alt]` entries; anything not exactly three long is
/// dropped. Returns the kept positions and the dropped count.
fn retain_3d_positions(raw: &Value) -> Result<(Vec<Position>, usize), ParseError> {
    let entries = raw
        .as_array()
        .ok_or_else(|| ParseError::InvalidCoordinate(raw.to_string()))?;

    let mut positions = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for entry in entries {
        let components = entry
            .as_array()
            .ok_or_else(|| ParseError::InvalidCoordinate(entry.to_string()))?;
        if components.len() != 3 {
            dropped += 1;
            continue;
        }
        let mut position = [0.0; 3];
        for (slot, component) in position.iter_mut().zip(components) {
            *slot = component
                .as_f64()
                .ok_or_else(|| ParseError::InvalidCoordinate(entry.to_string()))?;
        }
        positions.push(position);
    }
    Ok((positions, dropped))
}
