use shared::{HomePosition, Position};

/// Home position from the first coordinate; `{0, 0, 0}` for an empty route.
pub fn infer_home_position(coordinates: &[Position]) -> HomePosition {
    match coordinates.first() {
        Some(&[longitude, latitude, altitude]) => HomePosition {
            latitude,
            longitude,
            altitude,
        },
        None => HomePosition::default(),
    }
}

/// Declared home wins over inference; `altitude_override` is the per-format
/// hook (QGC takeoff altitude, DJI takeoff security height).
pub fn resolve_home_position(
    coordinates: &[Position],
    declared: Option<HomePosition>,
    altitude_override: Option<f64>,
) -> HomePosition {
    let mut home = declared.unwrap_or_else(|| infer_home_position(coordinates));
    if let Some(altitude) = altitude_override {
        home.altitude = altitude;
    }
    home
}
