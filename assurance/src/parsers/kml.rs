//! KML route files. The document is first converted into line features
//! (one per `<LineString>` under a `<Placemark>`, `MultiGeometry` included),
//! which are then flattened into a single route in document order.

use std::collections::HashMap;

use shared::{FlightPlanData, KmlFileInfo, PlanConfig, Position, SourceMetadata};
use xmltree::Element;

use super::xml::{child_text, descendants, elements_named, parse_document, parse_tuple, text_of};
use super::{navigate_waypoints, PlanParts};
use crate::error::ParseError;
use crate::home::infer_home_position;

const SHAPE_LENGTH: &str = "Shape__Length";

#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    pub coordinates: Vec<Position>,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct KmlDocument {
    pub name: Option<String>,
    pub lines: Vec<LineFeature>,
    /// `Shape__Length` of each placemark that contributed a line.
    pub shape_lengths: Vec<f64>,
    pub dropped_positions: usize,
}

/// Generic conversion of a KML document into line features.
pub fn line_features(content: &str) -> Result<KmlDocument, ParseError> {
    let root = parse_document(content, "kml")?;
    let name = elements_named(&root, "Document")
        .first()
        .and_then(|document| child_text(document, "name"));

    let mut doc = KmlDocument {
        name,
        ..Default::default()
    };

    for placemark in elements_named(&root, "Placemark") {
        let properties = placemark_properties(placemark);
        let line_count = doc.lines.len();
        for line in elements_named(placemark, "LineString") {
            let Some(text) = line.get_child("coordinates").and_then(text_of) else {
                continue;
            };
            let (coordinates, dropped) = parse_coordinates(&text)?;
            doc.dropped_positions += dropped;
            doc.lines.push(LineFeature {
                coordinates,
                properties: properties.clone(),
            });
        }
        if doc.lines.len() > line_count {
            let length = properties.get(SHAPE_LENGTH);
            if let Some(length) = length.and_then(|value| value.trim().parse::<f64>().ok()) {
                doc.shape_lengths.push(length);
            }
        }
    }

    Ok(doc)
}

pub fn parse(content: &str) -> Result<FlightPlanData, ParseError> {
    let doc = line_features(content)?;
    if doc.lines.is_empty() {
        return Err(ParseError::NoLineString);
    }

    let coordinates: Vec<Position> = doc
        .lines
        .iter()
        .flat_map(|line| line.coordinates.iter().copied())
        .collect();

    let distance = (!doc.shape_lengths.is_empty()).then(|| doc.shape_lengths.iter().sum());

    tracing::debug!(
        "kml: {} line strings, {} coordinates, {} dropped",
        doc.lines.len(),
        coordinates.len(),
        doc.dropped_positions
    );

    PlanParts {
        waypoints: navigate_waypoints(&coordinates),
        home_position: infer_home_position(&coordinates),
        coordinates,
        config: PlanConfig::Kml,
        metadata: SourceMetadata::Kml {
            file: KmlFileInfo {
                line_string_count: doc.lines.len(),
                dropped_positions: doc.dropped_positions,
                name: doc.name,
            },
            distance,
        },
    }
    .into_plan()
}

/// `<name>` plus `ExtendedData` (`Data/value` and `SchemaData/SimpleData`).
fn placemark_properties(placemark: &Element) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    if let Some(name) = child_text(placemark, "name") {
        properties.insert("name".to_string(), name);
    }
    let Some(extended) = placemark.get_child("ExtendedData") else {
        return properties;
    };

    for element in descendants(extended) {
        let Some(key) = element.attributes.get("name") else {
            continue;
        };
        let value = match element.name.as_str() {
            "Data" => child_text(element, "value"),
            "SimpleData" => text_of(element),
            _ => None,
        };
        if let Some(value) = value {
            properties.insert(key.clone(), value);
        }
    }
    properties
}

fn parse_coordinates(text: &str) -> Result<(Vec<Position>, usize), ParseError> {
    let mut positions = Vec::new();
    let mut dropped = 0;
    for tuple in text.split_whitespace() {
        match parse_tuple(tuple)?.as_slice() {
            &[lon, lat, alt] => positions.push([lon, lat, alt]),
            _ => dropped += 1,
        }
    }
    Ok((positions, dropped))
}
