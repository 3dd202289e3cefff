//! DJI WPML waypoint missions packaged as `.kmz`.
//!
//! Only two documents matter: `template.kml` (mission config, take-off
//! reference) and `waylines.wpml` (the executable placemarks). Both may live
//! at the archive root or under `wpmz/`.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use shared::{
    AltitudeMode, FlightPlanData, HomePosition, KmzFileInfo, KmzMissionConfig, KmzSegment,
    PlanConfig, Position, SourceMetadata, WaypointData, COMMAND_NAVIGATE,
};
use xmltree::Element;
use zip::result::ZipError;
use zip::ZipArchive;

use super::xml::{child_text, elements_named, find_number, find_text, parse_document, parse_tuple};
use super::PlanParts;
use crate::error::ParseError;
use crate::home::resolve_home_position;

const TEMPLATE_ENTRIES: [&str; 2] = ["template.kml", "wpmz/template.kml"];
const WAYLINES_ENTRIES: [&str; 2] = ["waylines.wpml", "wpmz/waylines.wpml"];

const HEIGHT_MODE_RELATIVE: &str = "relativeToStartPoint";
const HEIGHT_MODE_TERRAIN: &str = "realTimeFollowSurface";

/// The named text entries of a mission archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KmzArchive {
    entries: BTreeMap<String, String>,
}

impl KmzArchive {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
        }
    }

    /// Reads just the mission documents out of a zip archive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = BTreeMap::new();

        for name in TEMPLATE_ENTRIES.iter().chain(WAYLINES_ENTRIES.iter()) {
            let mut file = match archive.by_name(name) {
                Ok(file) => file,
                Err(ZipError::FileNotFound) => continue,
                Err(err) => return Err(err.into()),
            };
            let mut text = String::new();
            file.read_to_string(&mut text)
                .map_err(|source| ParseError::ArchiveEntry {
                    name: name.to_string(),
                    source,
                })?;
            entries.insert(name.to_string(), text);
        }

        tracing::debug!("kmz archive: found entries {:?}", entries.keys());
        Ok(Self { entries })
    }

    pub fn entry(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    fn first_of(&self, names: &[&'static str]) -> Option<(&'static str, &str)> {
        names
            .iter()
            .find_map(|name| self.entry(name).map(|text| (*name, text)))
    }
}

pub fn altitude_mode_for_height_mode(mode: Option<&str>) -> AltitudeMode {
    match mode {
        Some(HEIGHT_MODE_RELATIVE) => AltitudeMode::Relative,
        Some(HEIGHT_MODE_TERRAIN) => AltitudeMode::Terrain,
        _ => AltitudeMode::Absolute,
    }
}

struct Documents {
    template: Option<Element>,
    waylines: Option<Element>,
}

impl Documents {
    /// Mission-level settings: template first.
    fn mission_text(&self, name: &str) -> Option<String> {
        [&self.template, &self.waylines]
            .into_iter()
            .flatten()
            .find_map(|doc| find_text(doc, name))
    }

    fn mission_number(&self, name: &str) -> Option<f64> {
        [&self.template, &self.waylines]
            .into_iter()
            .flatten()
            .find_map(|doc| find_number(doc, name))
    }

    /// Execution settings: waylines first.
    fn execution_text(&self, name: &str) -> Option<String> {
        [&self.waylines, &self.template]
            .into_iter()
            .flatten()
            .find_map(|doc| find_text(doc, name))
    }

    fn placemark_document(&self) -> Option<&Element> {
        self.waylines.as_ref().or(self.template.as_ref())
    }
}

pub fn parse(archive: &KmzArchive) -> Result<FlightPlanData, ParseError> {
    let template = archive.first_of(&TEMPLATE_ENTRIES);
    let waylines = archive.first_of(&WAYLINES_ENTRIES);
    if template.is_none() && waylines.is_none() {
        return Err(ParseError::UnsupportedFormat(
            "archive contains neither template.kml nor waylines.wpml".to_string(),
        ));
    }

    let docs = Documents {
        template: template
            .map(|(_, text)| parse_document(text, "template.kml"))
            .transpose()?,
        waylines: waylines
            .map(|(_, text)| parse_document(text, "waylines.wpml"))
            .transpose()?,
    };

    let declared_home = docs
        .mission_text("takeOffRefPoint")
        .map(|text| parse_reference_point(&text))
        .transpose()?;

    let execute_height_mode = docs.execution_text("executeHeightMode");
    let altitude_mode = altitude_mode_for_height_mode(execute_height_mode.as_deref());

    let config = KmzMissionConfig {
        take_off_security_height: docs.mission_number("takeOffSecurityHeight"),
        global_transitional_speed: docs.mission_number("globalTransitionalSpeed"),
        auto_flight_speed: docs.mission_number("autoFlightSpeed"),
        finish_action: docs.mission_text("finishAction"),
        fly_to_wayline_mode: docs.mission_text("flyToWaylineMode"),
        rc_lost_action: docs
            .mission_text("executeRCLostAction")
            .or_else(|| docs.mission_text("exitOnRCLost")),
        execute_height_mode,
    };

    let mut coordinates: Vec<Position> = Vec::new();
    let mut skipped_placemarks = 0;
    let mut segments = Vec::new();

    if let Some(doc) = docs.placemark_document() {
        for placemark in elements_named(doc, "Placemark") {
            match placemark_position(placemark) {
                Some(position) => coordinates.push(position),
                None => {
                    skipped_placemarks += 1;
                    tracing::debug!("skipping placemark without a usable point");
                }
            }
        }
        segments = elements_named(doc, "Folder")
            .into_iter()
            .map(|folder| KmzSegment {
                wayline_id: child_text(folder, "waylineId").and_then(|v| v.parse().ok()),
                distance: child_text(folder, "distance").and_then(|v| v.parse().ok()),
                duration: child_text(folder, "duration").and_then(|v| v.parse().ok()),
                placemark_count: elements_named(folder, "Placemark").len(),
            })
            .filter(|segment| segment.placemark_count > 0)
            .collect();
    }

    let waypoints = coordinates
        .iter()
        .enumerate()
        .map(|(index, position)| WaypointData {
            index,
            altitude_mode,
            original_altitude: position[2],
            command_type: Some(COMMAND_NAVIGATE),
            frame: None,
            placeholder: false,
        })
        .collect();

    let altitude_override = match altitude_mode {
        AltitudeMode::Terrain => config.take_off_security_height,
        _ => None,
    };
    let home_position = resolve_home_position(&coordinates, declared_home, altitude_override);

    let file = KmzFileInfo {
        template_entry: template.map(|(name, _)| name.to_string()),
        waylines_entry: waylines.map(|(name, _)| name.to_string()),
        author: docs.mission_text("author"),
        create_time: docs.mission_text("createTime"),
        update_time: docs.mission_text("updateTime"),
        skipped_placemarks,
    };

    tracing::debug!(
        "kmz: {} placemarks ({} skipped), height mode {:?}",
        coordinates.len(),
        skipped_placemarks,
        altitude_mode
    );

    PlanParts {
        coordinates,
        waypoints,
        home_position,
        config: PlanConfig::Kmz(config),
        metadata: SourceMetadata::Kmz { file, segments },
    }
    .into_plan()
}

/// `takeOffRefPoint` is `lat,lon[,alt]`.
fn parse_reference_point(text: &str) -> Result<HomePosition, ParseError> {
    match parse_tuple(text)?.as_slice() {
        &[latitude, longitude] => Ok(HomePosition {
            latitude,
            longitude,
            altitude: 0.0,
        }),
        &[latitude, longitude, altitude, ..] => Ok(HomePosition {
            latitude,
            longitude,
            altitude,
        }),
        _ => Err(ParseError::InvalidCoordinate(text.to_string())),
    }
}

/// `Point/coordinates` is `lon,lat[,alt]`; a missing altitude falls back to
/// `executeHeight`, then `height`.
fn placemark_position(placemark: &Element) -> Option<Position> {
    let text = placemark
        .get_child("Point")
        .and_then(|point| child_text(point, "coordinates"))?;
    let components = parse_tuple(&text).ok()?;
    let (lon, lat) = match components.as_slice() {
        [lon, lat, ..] => (*lon, *lat),
        _ => return None,
    };
    let altitude = components.get(2).copied().or_else(|| {
        ["executeHeight", "height"]
            .iter()
            .find_map(|name| child_text(placemark, name).and_then(|v| v.parse().ok()))
    })?;
    Some([lon, lat, altitude])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:wpml="http://www.dji.com/wpmz/1.0.2">
  <Document>
    <wpml:author>pilot</wpml:author>
    <wpml:createTime>1637600807044</wpml:createTime>
    <wpml:updateTime>1637600875837</wpml:updateTime>
    <wpml:missionConfig>
      <wpml:flyToWaylineMode>safely</wpml:flyToWaylineMode>
      <wpml:finishAction>goHome</wpml:finishAction>
      <wpml:exitOnRCLost>executeLostAction</wpml:exitOnRCLost>
      <wpml:executeRCLostAction>goBack</wpml:executeRCLostAction>
      <wpml:takeOffSecurityHeight>20</wpml:takeOffSecurityHeight>
      <wpml:takeOffRefPoint>-33.8688,151.2093,35.5</wpml:takeOffRefPoint>
      <wpml:globalTransitionalSpeed>8</wpml:globalTransitionalSpeed>
    </wpml:missionConfig>
  </Document>
</kml>"#;

    fn waylines(height_mode: &str, placemarks: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:wpml="http://www.dji.com/wpmz/1.0.2">
  <Document>
    <Folder>
      <wpml:templateId>0</wpml:templateId>
      <wpml:executeHeightMode>{height_mode}</wpml:executeHeightMode>
      <wpml:waylineId>0</wpml:waylineId>
      <wpml:distance>512.5</wpml:distance>
      <wpml:duration>96</wpml:duration>
      <wpml:autoFlightSpeed>7</wpml:autoFlightSpeed>
      {placemarks}
    </Folder>
  </Document>
</kml>"#
        )
    }

    fn placemark(index: usize, coordinates: &str, execute_height: f64) -> String {
        format!(
            "<Placemark><Point><coordinates>{coordinates}</coordinates></Point><wpml:index>{index}</wpml:index><wpml:executeHeight>{execute_height}</wpml:executeHeight></Placemark>"
        )
    }

    fn three_placemarks() -> String {
        [
            placemark(0, "151.2093,-33.8688", 60.0),
            placemark(1, "151.2100,-33.8700", 70.0),
            placemark(2, "151.2120,-33.8720,80", 75.0),
        ]
        .concat()
    }

    #[test]
    fn parses_mission_with_wpmz_prefix() {
        let archive = KmzArchive::from_entries([
            ("wpmz/template.kml", TEMPLATE.to_string()),
            ("wpmz/waylines.wpml", waylines("WGS84", &three_placemarks())),
        ]);
        let plan = parse(&archive).unwrap();

        assert_eq!(plan.coordinates().len(), 3);
        assert_eq!(plan.waypoints().len(), 3);
        assert_eq!(plan.coordinates()[0], [151.2093, -33.8688, 60.0]);
        assert_eq!(plan.coordinates()[2][2], 80.0);
        assert!(plan
            .waypoints()
            .iter()
            .enumerate()
            .all(|(i, w)| w.index == i && w.altitude_mode == AltitudeMode::Absolute));

        let home = plan.properties.home_position;
        assert_eq!(home.latitude, -33.8688);
        assert_eq!(home.longitude, 151.2093);
        assert_eq!(home.altitude, 35.5);

        match &plan.properties.config {
            PlanConfig::Kmz(config) => {
                assert_eq!(config.take_off_security_height, Some(20.0));
                assert_eq!(config.finish_action.as_deref(), Some("goHome"));
                assert_eq!(config.rc_lost_action.as_deref(), Some("goBack"));
                assert_eq!(config.auto_flight_speed, Some(7.0));
            }
            other => panic!("unexpected config {other:?}"),
        }
        match &plan.properties.metadata.source {
            SourceMetadata::Kmz { file, segments } => {
                assert_eq!(file.author.as_deref(), Some("pilot"));
                assert_eq!(file.waylines_entry.as_deref(), Some("wpmz/waylines.wpml"));
                assert_eq!(segments.len(), 1);
                assert_eq!(segments[0].distance, Some(512.5));
                assert_eq!(segments[0].placemark_count, 3);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn relative_height_mode_applies_to_every_waypoint() {
        let archive = KmzArchive::from_entries([
            ("template.kml", TEMPLATE.to_string()),
            (
                "waylines.wpml",
                waylines(HEIGHT_MODE_RELATIVE, &three_placemarks()),
            ),
        ]);
        let plan = parse(&archive).unwrap();
        assert!(plan
            .waypoints()
            .iter()
            .all(|w| w.altitude_mode == AltitudeMode::Relative));
        assert_eq!(plan.properties.home_position.altitude, 35.5);
    }

    #[test]
    fn terrain_mode_uses_security_height_for_home() {
        let archive = KmzArchive::from_entries([
            ("template.kml", TEMPLATE.to_string()),
            (
                "waylines.wpml",
                waylines(HEIGHT_MODE_TERRAIN, &three_placemarks()),
            ),
        ]);
        let plan = parse(&archive).unwrap();
        assert!(plan
            .waypoints()
            .iter()
            .all(|w| w.altitude_mode == AltitudeMode::Terrain));
        assert_eq!(plan.properties.home_position.altitude, 20.0);
    }

    #[test]
    fn skips_placemarks_without_point() {
        let placemarks = format!(
            "{}<Placemark><wpml:index>9</wpml:index></Placemark>{}",
            placemark(0, "151.2093,-33.8688", 60.0),
            placemark(1, "bogus", 60.0)
        );
        let archive = KmzArchive::from_entries([("waylines.wpml", waylines("WGS84", &placemarks))]);
        let plan = parse(&archive).unwrap();
        assert_eq!(plan.coordinates().len(), 1);
        match &plan.properties.metadata.source {
            SourceMetadata::Kmz { file, .. } => {
                assert_eq!(file.skipped_placemarks, 2);
                assert_eq!(file.template_entry, None);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
        // without a takeOffRefPoint the first placemark is home
        assert_eq!(plan.properties.home_position.altitude, 60.0);
    }

    #[test]
    fn missing_documents_is_unsupported_format() {
        let archive = KmzArchive::from_entries([("doc.kml", "<kml/>")]);
        let err = parse(&archive).unwrap_err();
        assert!(err.is_unsupported_format());
    }

    #[test]
    fn template_only_without_placemarks_fails() {
        let archive = KmzArchive::from_entries([("template.kml", TEMPLATE)]);
        assert!(matches!(parse(&archive), Err(ParseError::NoCoordinates)));
    }

    #[test]
    fn reads_zip_archive() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("wpmz/template.kml", options).unwrap();
        writer.write_all(TEMPLATE.as_bytes()).unwrap();
        writer.start_file("wpmz/waylines.wpml", options).unwrap();
        writer
            .write_all(waylines("WGS84", &three_placemarks()).as_bytes())
            .unwrap();
        writer.start_file("wpmz/res/preview.png", options).unwrap();
        writer.write_all(&[0x89, 0x50]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let archive = KmzArchive::from_bytes(&bytes).unwrap();
        assert!(archive.entry("wpmz/template.kml").is_some());
        assert!(archive.entry("wpmz/res/preview.png").is_none());
        assert_eq!(parse(&archive).unwrap().coordinates().len(), 3);
    }

    #[test]
    fn rejects_non_zip_bytes() {
        assert!(matches!(
            KmzArchive::from_bytes(b"not a zip"),
            Err(ParseError::Archive(_))
        ));
    }
}
