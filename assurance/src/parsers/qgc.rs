//! QGroundControl plain-text mission (`.waypoints`, `QGC WPL 110`).
//!
//! Each row is tab separated:
//! `INDEX CURRENT FRAME COMMAND P1 P2 P3 P4 LAT LON ALT AUTOCONTINUE`.

use shared::{
    AltitudeMode, HomePosition, PlanConfig, Position, SourceMetadata, WaypointData,
    WaypointsFileInfo, COMMAND_TAKEOFF,
};

use super::PlanParts;
use crate::error::ParseError;
use crate::home::resolve_home_position;

pub const HEADER: &str = "QGC WPL 110";

const MIN_FIELDS: usize = 12;
const FRAME_RELATIVE: u8 = 3;
const FRAME_TERRAIN: u8 = 10;

pub fn altitude_mode_for_frame(frame: u8) -> AltitudeMode {
    match frame {
        FRAME_RELATIVE => AltitudeMode::Relative,
        FRAME_TERRAIN => AltitudeMode::Terrain,
        _ => AltitudeMode::Absolute,
    }
}

#[derive(Debug, Clone, Copy)]
struct Row {
    frame: u8,
    command: u16,
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

impl Row {
    fn parse(fields: &[&str], line: usize) -> Result<Self, ParseError> {
        let declared_index: u32 = number(fields[0], line, "index")?;
        let row = Self {
            frame: number(fields[2], line, "frame")?,
            command: number(fields[3], line, "command")?,
            latitude: number(fields[8], line, "latitude")?,
            longitude: number(fields[9], line, "longitude")?,
            altitude: number(fields[10], line, "altitude")?,
        };
        tracing::trace!("line {} declares waypoint {}", line, declared_index);
        Ok(row)
    }

    /// Exported placeholder rows (typically takeoff/RTL) sit at null island.
    fn is_placeholder(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

fn number<T: std::str::FromStr>(
    raw: &str,
    line: usize,
    field: &'static str,
) -> Result<T, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
        line,
        field,
        value: raw.trim().to_string(),
    })
}

pub fn parse(content: &str) -> Result<shared::FlightPlanData, ParseError> {
    let mut lines = content.lines();
    let header = lines.next().unwrap_or_default();
    if !header.contains(HEADER) {
        return Err(ParseError::InvalidHeader {
            expected: HEADER,
            found: header.trim().to_string(),
        });
    }

    let mut coordinates: Vec<Position> = Vec::new();
    let mut waypoints: Vec<WaypointData> = Vec::new();
    let mut home_guess: Option<HomePosition> = None;
    let mut takeoff: Option<Row> = None;
    let mut first_row_has_coordinate = false;
    let mut file = WaypointsFileInfo::default();

    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        file.total_lines += 1;

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            if !line.trim().is_empty() {
                file.skipped_lines += 1;
                tracing::debug!("line {}: {} fields, skipped", line_no, fields.len());
            }
            continue;
        }

        let row = Row::parse(&fields, line_no)?;

        if home_guess.is_none() {
            home_guess = Some(HomePosition {
                latitude: row.latitude,
                longitude: row.longitude,
                altitude: row.altitude,
            });
        }
        if row.command == COMMAND_TAKEOFF && takeoff.is_none() {
            takeoff = Some(row);
        }

        if row.is_placeholder() {
            file.excluded_placeholders += 1;
        } else {
            if waypoints.is_empty() {
                first_row_has_coordinate = true;
            }
            coordinates.push([row.longitude, row.latitude, row.altitude]);
        }

        waypoints.push(WaypointData {
            index: waypoints.len(),
            altitude_mode: altitude_mode_for_frame(row.frame),
            original_altitude: row.altitude,
            command_type: Some(row.command),
            frame: Some(row.frame),
            placeholder: row.is_placeholder(),
        });
    }

    if let Some(takeoff) = takeoff {
        file.takeoff_altitude = Some(takeoff.altitude);
        let mode = altitude_mode_for_frame(takeoff.frame);
        if matches!(mode, AltitudeMode::Relative | AltitudeMode::Terrain) {
            if let Some(first) = waypoints.first_mut() {
                first.altitude_mode = mode;
                first.original_altitude = takeoff.altitude;
                first.frame = Some(takeoff.frame);
            }
            if first_row_has_coordinate {
                if let Some(first) = coordinates.first_mut() {
                    first[2] = takeoff.altitude;
                }
            }
        }
    }

    let home_position = resolve_home_position(
        &coordinates,
        home_guess,
        takeoff.map(|row| row.altitude),
    );

    tracing::debug!(
        "waypoints file: {} rows, {} placeholders, {} skipped lines",
        waypoints.len(),
        file.excluded_placeholders,
        file.skipped_lines
    );

    PlanParts {
        coordinates,
        waypoints,
        home_position,
        config: PlanConfig::Waypoints,
        metadata: SourceMetadata::Waypoints { file },
    }
    .into_plan()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, frame: u8, command: u16, lat: f64, lon: f64, alt: f64) -> String {
        format!("{index}\t0\t{frame}\t{command}\t0\t0\t0\t0\t{lat}\t{lon}\t{alt}\t1")
    }

    fn file(rows: &[String]) -> String {
        let mut text = String::from("QGC WPL 110\n");
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        text
    }

    #[test]
    fn parses_minimal_mission() {
        let text = file(&[
            row(0, 0, 16, -33.8688, 151.2093, 25.0),
            row(1, 3, 16, -33.87, 151.21, 50.0),
            row(2, 3, 16, -33.872, 151.212, 60.0),
        ]);
        let plan = parse(&text).unwrap();

        assert_eq!(plan.coordinates().len(), 3);
        assert_eq!(plan.waypoints().len(), 3);
        let indices: Vec<usize> = plan.waypoints().iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(plan.coordinates()[1], [151.21, -33.87, 50.0]);
        assert_eq!(plan.waypoints()[0].altitude_mode, AltitudeMode::Absolute);
        assert_eq!(plan.waypoints()[1].altitude_mode, AltitudeMode::Relative);
        assert_eq!(plan.properties.home_position.latitude, -33.8688);
        assert_eq!(plan.properties.home_position.altitude, 25.0);
        assert!(!plan.properties.metadata.processed);
    }

    #[test]
    fn rejects_wrong_header_regardless_of_rows() {
        let text = format!("QGC WPL 100\n{}\n", row(0, 0, 16, 1.0, 1.0, 1.0));
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. }));
        assert!(matches!(parse(""), Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn frame_ten_is_terrain() {
        assert_eq!(altitude_mode_for_frame(10), AltitudeMode::Terrain);
        assert_eq!(altitude_mode_for_frame(3), AltitudeMode::Relative);
        assert_eq!(altitude_mode_for_frame(0), AltitudeMode::Absolute);
        assert_eq!(altitude_mode_for_frame(2), AltitudeMode::Absolute);
    }

    #[test]
    fn terrain_takeoff_overrides_first_waypoint() {
        let text = file(&[
            row(0, 0, 16, -33.8688, 151.2093, 25.0),
            row(1, 10, 22, -33.8688, 151.2093, 40.0),
            row(2, 10, 16, -33.87, 151.21, 60.0),
        ]);
        let plan = parse(&text).unwrap();

        let first = &plan.waypoints()[0];
        assert_eq!(first.altitude_mode, AltitudeMode::Terrain);
        assert_eq!(first.original_altitude, 40.0);
        assert_eq!(plan.coordinates()[0][2], 40.0);
        assert_eq!(plan.properties.home_position.altitude, 40.0);
        assert_eq!(plan.properties.home_position.latitude, -33.8688);
    }

    #[test]
    fn absolute_takeoff_only_sets_home_altitude() {
        let text = file(&[
            row(0, 3, 16, -33.8688, 151.2093, 25.0),
            row(1, 0, 22, -33.8688, 151.2093, 120.0),
        ]);
        let plan = parse(&text).unwrap();
        assert_eq!(plan.waypoints()[0].altitude_mode, AltitudeMode::Relative);
        assert_eq!(plan.waypoints()[0].original_altitude, 25.0);
        assert_eq!(plan.properties.home_position.altitude, 120.0);
    }

    #[test]
    fn placeholder_rows_keep_waypoint_but_drop_coordinate() {
        let text = file(&[
            row(0, 0, 16, -33.8688, 151.2093, 25.0),
            row(1, 3, 22, 0.0, 0.0, 30.0),
            row(2, 3, 16, -33.87, 151.21, 50.0),
        ]);
        let plan = parse(&text).unwrap();
        assert_eq!(plan.waypoints().len(), 3);
        assert_eq!(plan.coordinates().len(), 2);
        assert_eq!(plan.waypoints()[1].command_type, Some(COMMAND_TAKEOFF));
        match &plan.properties.metadata.source {
            SourceMetadata::Waypoints { file } => {
                assert_eq!(file.excluded_placeholders, 1);
                assert_eq!(file.takeoff_altitude, Some(30.0));
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn short_lines_are_skipped() {
        let text = format!(
            "QGC WPL 110\n{}\nnot\ta\trow\n\n{}\n",
            row(0, 0, 16, 1.0, 2.0, 3.0),
            row(1, 0, 16, 1.1, 2.1, 3.0)
        );
        let plan = parse(&text).unwrap();
        assert_eq!(plan.waypoints().len(), 2);
        match &plan.properties.metadata.source {
            SourceMetadata::Waypoints { file } => assert_eq!(file.skipped_lines, 1),
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn unparseable_latitude_fails() {
        let text = "QGC WPL 110\n0\t0\t0\t16\t0\t0\t0\t0\tnorth\t151.2\t10\t1\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber { line: 2, field: "latitude", .. }
        ));
    }

    #[test]
    fn only_placeholders_fails() {
        let text = file(&[row(0, 0, 16, 0.0, 0.0, 0.0)]);
        assert!(matches!(parse(&text), Err(ParseError::NoCoordinates)));
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = file(&[
            row(0, 0, 16, -33.8688, 151.2093, 25.0),
            row(1, 3, 16, -33.87, 151.21, 50.0),
        ]);
        assert_eq!(parse(&text).unwrap(), parse(&text).unwrap());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let text = file(&[
            row(0, 0, 16, -33.8688, 151.2093, 25.0),
            row(1, 3, 16, -33.87, 151.21, 50.0),
        ])
        .replace('\n', "\r\n");
        let plan = parse(&text).unwrap();
        assert_eq!(plan.coordinates()[1][2], 50.0);
    }
}
