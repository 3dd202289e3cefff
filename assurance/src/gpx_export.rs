use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Route, Waypoint};
use shared::{FlightPlanData, Position};

use crate::error::ExportError;

const CREATOR: &str = "flight-check";

/// The plan route as a GPX 1.1 `<rte>`, one point per coordinate.
pub fn encode_plan_as_gpx(plan: &FlightPlanData, name: &str) -> Result<Vec<u8>, ExportError> {
    let coordinates = plan.coordinates();
    if coordinates.is_empty() {
        return Err(ExportError::EmptyRoute);
    }

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut route = Route {
        name: Some(name.to_string()),
        ..Default::default()
    };
    route.points = coordinates
        .iter()
        .enumerate()
        .map(|(index, position)| to_waypoint(index, position))
        .collect();
    gpx.routes.push(route);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    tracing::debug!("encoded {} route points as GPX", coordinates.len());
    Ok(buffer)
}

pub fn encode_plan_as_gpx_base64(plan: &FlightPlanData, name: &str) -> Result<String, ExportError> {
    Ok(BASE64.encode(encode_plan_as_gpx(plan, name)?))
}

fn to_waypoint(index: usize, &[lon, lat, alt]: &Position) -> Waypoint {
    let mut waypoint = Waypoint::new(Point::new(lon, lat));
    waypoint.elevation = Some(alt);
    waypoint.name = Some(format!("WP{index}"));
    waypoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::geojson;

    fn plan() -> FlightPlanData {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[151.0, -33.0, 100.0], [151.001, -33.001, 120.0]]
                }
            }]
        })
        .to_string();
        geojson::parse(&text).unwrap()
    }

    #[test]
    fn writes_route_points_with_elevation() {
        let bytes = encode_plan_as_gpx(&plan(), "survey").unwrap();
        let parsed = gpx::read(bytes.as_slice()).unwrap();

        assert_eq!(parsed.routes.len(), 1);
        let route = &parsed.routes[0];
        assert_eq!(route.name.as_deref(), Some("survey"));
        assert_eq!(route.points.len(), 2);
        assert_eq!(route.points[1].elevation, Some(120.0));
        assert_eq!(route.points[1].point().x(), 151.001);
        assert_eq!(route.points[0].name.as_deref(), Some("WP0"));
    }

    #[test]
    fn base64_decodes_to_gpx() {
        let encoded = encode_plan_as_gpx_base64(&plan(), "survey").unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert!(String::from_utf8(decoded).unwrap().contains("<rte>"));
    }

    #[test]
    fn empty_route_is_rejected() {
        let mut plan = plan();
        plan.features.clear();
        assert!(matches!(
            encode_plan_as_gpx(&plan, "x"),
            Err(ExportError::EmptyRoute)
        ));
    }
}
