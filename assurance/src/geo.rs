//! Great-circle and along-line helpers shared by the distance accumulator and
//! the terrain sampler. Coordinates are `x = longitude`, `y = latitude`.

use geo_types::{Coord, LineString};
use serde::Serialize;
use shared::Position;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let dlat = (b.y - a.y).to_radians();
    let dlon = (b.x - a.x).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine_m(a, b) / 1000.0
}

/// Horizontal route line, altitude dropped.
pub fn horizontal_line(positions: &[Position]) -> LineString<f64> {
    positions
        .iter()
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect::<Vec<_>>()
        .into()
}

pub fn line_length_m(line: &LineString<f64>) -> f64 {
    line.lines().map(|seg| haversine_m(seg.start, seg.end)).sum()
}

/// Point `distance_m` along `line`, clamped to its ends.
pub fn point_along(line: &LineString<f64>, distance_m: f64) -> Option<Coord<f64>> {
    let first = *line.0.first()?;
    if distance_m <= 0.0 {
        return Some(first);
    }

    let mut travelled = 0.0;
    for seg in line.lines() {
        let length = haversine_m(seg.start, seg.end);
        if travelled + length >= distance_m {
            if length <= f64::EPSILON {
                return Some(seg.end);
            }
            let t = (distance_m - travelled) / length;
            return Some(Coord {
                x: seg.start.x + (seg.end.x - seg.start.x) * t,
                y: seg.start.y + (seg.end.y - seg.start.y) * t,
            });
        }
        travelled += length;
    }

    line.0.last().copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub point: Coord<f64>,
    /// Vertex index the point is attributed to: the segment start, or the
    /// segment end when the projection lands on it.
    pub index: usize,
    pub distance_m: f64,
}

pub fn nearest_point_on_line(line: &LineString<f64>, target: Coord<f64>) -> Option<NearestPoint> {
    match line.0.as_slice() {
        [] => None,
        [only] => Some(NearestPoint {
            point: *only,
            index: 0,
            distance_m: haversine_m(*only, target),
        }),
        _ => {
            let mut best: Option<NearestPoint> = None;
            for (idx, seg) in line.lines().enumerate() {
                let (point, t) = project_onto_segment(seg.start, seg.end, target);
                let distance_m = haversine_m(point, target);
                let index = if t >= 1.0 { idx + 1 } else { idx };
                if best.map_or(true, |b| distance_m < b.distance_m) {
                    best = Some(NearestPoint {
                        point,
                        index,
                        distance_m,
                    });
                }
            }
            best
        }
    }
}

/// Projection in a local equirectangular frame centred on `target`.
fn project_onto_segment(a: Coord<f64>, b: Coord<f64>, target: Coord<f64>) -> (Coord<f64>, f64) {
    let scale_x = target.y.to_radians().cos();
    let (ax, ay) = ((a.x - target.x) * scale_x, a.y - target.y);
    let (bx, by) = ((b.x - target.x) * scale_x, b.y - target.y);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON * f64::EPSILON {
        return (a, 0.0);
    }
    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let point = Coord {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    };
    (point, t)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn ring(&self) -> [Coord<f64>; 4] {
        [
            Coord { x: self.min_lon, y: self.min_lat },
            Coord { x: self.max_lon, y: self.min_lat },
            Coord { x: self.max_lon, y: self.max_lat },
            Coord { x: self.min_lon, y: self.max_lat },
        ]
    }

    /// Ground area covered by the box, square meters.
    pub fn area_m2(&self) -> f64 {
        ring_area_m2(&self.ring())
    }
}

/// Horizontal extent of a route.
pub fn route_bounds(positions: &[Position]) -> Option<BoundingBox> {
    bounding_box(&horizontal_line(positions).0)
}

pub fn bounding_box(points: &[Coord<f64>]) -> Option<BoundingBox> {
    let mut iter = points.iter().filter(|p| p.x.is_finite() && p.y.is_finite());
    let first = iter.next()?;
    let mut bbox = BoundingBox {
        min_lat: first.y,
        max_lat: first.y,
        min_lon: first.x,
        max_lon: first.x,
    };
    for p in iter {
        bbox.min_lat = bbox.min_lat.min(p.y);
        bbox.max_lat = bbox.max_lat.max(p.y);
        bbox.min_lon = bbox.min_lon.min(p.x);
        bbox.max_lon = bbox.max_lon.max(p.x);
    }
    Some(bbox)
}

/// Area of a closed or open ring on the sphere, square meters.
pub fn ring_area_m2(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    let mut total = 0.0;
    for i in 0..n {
        let p1 = ring[i];
        let p2 = ring[(i + 1) % n];
        total += (p2.x - p1.x).to_radians()
            * (2.0 + p1.y.to_radians().sin() + p2.y.to_radians().sin());
    }
    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn haversine_same_point() {
        assert_eq!(haversine_m(c(5.0, 45.0), c(5.0, 45.0)), 0.0);
    }

    #[test]
    fn hundredth_of_a_degree_is_about_1110_m() {
        let d = haversine_m(c(0.0, 0.0), c(0.0, 0.01));
        assert!((d - 1112.0).abs() < 5.0, "got {d}");
        assert!((haversine_km(c(0.0, 0.0), c(0.0, 0.01)) - 1.112).abs() < 0.005);
    }

    #[test]
    fn point_along_interpolates_within_segment() {
        let line = horizontal_line(&[[0.0, 0.0, 10.0], [0.0, 0.01, 10.0]]);
        let total = line_length_m(&line);
        let mid = point_along(&line, total / 2.0).unwrap();
        assert!((mid.y - 0.005).abs() < 1e-9);
        assert_eq!(point_along(&line, total * 2.0), Some(c(0.0, 0.01)));
        assert_eq!(point_along(&line, -1.0), Some(c(0.0, 0.0)));
    }

    #[test]
    fn point_along_empty_line() {
        let line = horizontal_line(&[]);
        assert_eq!(point_along(&line, 5.0), None);
    }

    #[test]
    fn nearest_point_attributes_segment_start() {
        let line = horizontal_line(&[[0.0, 0.0, 0.0], [0.01, 0.0, 0.0], [0.02, 0.0, 0.0]]);
        let nearest = nearest_point_on_line(&line, c(0.015, 0.001)).unwrap();
        assert_eq!(nearest.index, 1);
        assert!((nearest.point.x - 0.015).abs() < 1e-9);
        assert!(nearest.distance_m > 100.0 && nearest.distance_m < 120.0);
    }

    #[test]
    fn nearest_point_on_vertex_uses_vertex_index() {
        let line = horizontal_line(&[[0.0, 0.0, 0.0], [0.01, 0.0, 0.0], [0.02, 0.0, 0.0]]);
        assert_eq!(nearest_point_on_line(&line, c(0.01, 0.0)).unwrap().index, 1);
        assert_eq!(nearest_point_on_line(&line, c(0.02, 0.0)).unwrap().index, 2);
        assert_eq!(nearest_point_on_line(&line, c(0.0, 0.0)).unwrap().index, 0);
    }

    #[test]
    fn bounding_box_ignores_non_finite() {
        let bbox = bounding_box(&[c(1.0, 2.0), c(f64::NAN, 0.0), c(-1.0, 3.0)]).unwrap();
        assert_eq!(bbox.min_lon, -1.0);
        assert_eq!(bbox.max_lon, 1.0);
        assert_eq!(bbox.min_lat, 2.0);
        assert_eq!(bbox.max_lat, 3.0);
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn ring_area_of_small_square() {
        // ~1.112 km x 1.112 km at the equator
        let ring = [c(0.0, 0.0), c(0.01, 0.0), c(0.01, 0.01), c(0.0, 0.01)];
        let area = ring_area_m2(&ring);
        assert!((area - 1_236_000.0).abs() < 10_000.0, "got {area}");
    }

    #[test]
    fn route_bounds_cover_every_position() {
        let route = [[0.0, 0.0, 50.0], [0.01, 0.005, 60.0], [0.005, 0.01, 70.0]];
        let bounds = route_bounds(&route).unwrap();
        assert_eq!(bounds.min_lon, 0.0);
        assert_eq!(bounds.max_lon, 0.01);
        assert_eq!(bounds.max_lat, 0.01);
        assert!((bounds.area_m2() - ring_area_m2(&bounds.ring())).abs() < 1e-9);
        assert!((bounds.area_m2() - 1_236_000.0).abs() < 10_000.0);
        assert!(route_bounds(&[]).is_none());

        let json = serde_json::to_value(bounds).unwrap();
        assert_eq!(json["maxLon"], 0.01);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coord<f64>> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lon)| Coord { x: lon, y: lat })
        }

        proptest! {
            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
            }

            #[test]
            fn prop_haversine_bounded_by_half_circumference(a in valid_coord(), b in valid_coord()) {
                let max_distance = std::f64::consts::PI * EARTH_RADIUS_M;
                prop_assert!(haversine_m(a, b) <= max_distance + 1.0);
            }

            #[test]
            fn prop_point_along_stays_within_bbox(
                coords in prop::collection::vec(valid_coord(), 2..8),
                fraction in 0.0..=1.0f64
            ) {
                let line: LineString<f64> = coords.clone().into();
                let target = line_length_m(&line) * fraction;
                let point = point_along(&line, target).unwrap();
                let bbox = bounding_box(&coords).unwrap();
                prop_assert!(point.y >= bbox.min_lat - 1e-9 && point.y <= bbox.max_lat + 1e-9);
                prop_assert!(point.x >= bbox.min_lon - 1e-9 && point.x <= bbox.max_lon + 1e-9);
            }
        }
    }
}
