//! Pure geospatial math: haversine distance, polygon containment, bearing.
//!
//! Every function here is pure and allocation-free save for the polygon
//! slice itself. Latitudes are clamped to `[-90, 90]`, longitudes to
//! `[-180, 180]`; values outside that range fail with [`GeometryError`]
//! rather than silently wrapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters (WGS-84 authalic approximation).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distances under this many meters are treated as equal by callers that
/// need a boundary tolerance (see `spec.md` §4.1).
pub const DISTANCE_EPSILON_M: f64 = 1.0;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("latitude {0} out of range [-90, 90]")]
    InvalidLatitude(i64),
    #[error("longitude {0} out of range [-180, 180]")]
    InvalidLongitude(i64),
    #[error("polygon must have at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
}

/// A point on Earth's surface, WGS-84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting out-of-range values rather than clamping
    /// them silently — a caller that clamps an obviously bad GPS fix would
    /// rather see `InvalidGeometry` than a wrong-but-plausible point.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeometryError> {
        if !(-90.0..=90.0).contains(&latitude) || latitude.is_nan() {
            return Err(GeometryError::InvalidLatitude((latitude * 1000.0) as i64));
        }
        if !(-180.0..=180.0).contains(&longitude) || longitude.is_nan() {
            return Err(GeometryError::InvalidLongitude((longitude * 1000.0) as i64));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Ray-casting point-in-polygon test. `polygon` is assumed simple and
/// closed (first and last vertex need not be repeated). A point exactly on
/// a boundary edge counts as inside, per `spec.md` §8's boundary cases.
pub fn point_in_polygon(p: Coordinate, polygon: &[Coordinate]) -> Result<bool, GeometryError> {
    if polygon.len() < 3 {
        return Err(GeometryError::DegeneratePolygon(polygon.len()));
    }

    if on_any_edge(p, polygon) {
        return Ok(true);
    }

    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let vi = polygon[i];
        let vj = polygon[j];
        let crosses = (vi.latitude > p.latitude) != (vj.latitude > p.latitude);
        if crosses {
            let x_at_p_lat = vj.longitude
                + (p.latitude - vj.latitude) / (vi.latitude - vj.latitude)
                    * (vi.longitude - vj.longitude);
            if p.longitude < x_at_p_lat {
                inside = !inside;
            }
        }
        j = i;
    }
    Ok(inside)
}

fn on_any_edge(p: Coordinate, polygon: &[Coordinate]) -> bool {
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if point_on_segment(p, a, b) {
            return true;
        }
    }
    false
}

fn point_on_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> bool {
    let cross = (b.latitude - a.latitude) * (p.longitude - a.longitude)
        - (b.longitude - a.longitude) * (p.latitude - a.latitude);
    if cross.abs() > 1e-9 {
        return false;
    }
    let dot = (p.latitude - a.latitude) * (b.latitude - a.latitude)
        + (p.longitude - a.longitude) * (b.longitude - a.longitude);
    let len_sq = (b.latitude - a.latitude).powi(2) + (b.longitude - a.longitude).powi(2);
    dot >= 0.0 && dot <= len_sq
}

/// Initial bearing from `a` to `b`, in degrees clockwise from true north.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let theta = y.atan2(x).to_degrees();
    (theta + 360.0) % 360.0
}

/// Destination point `meters` away from `origin` along `bearing_deg`.
pub fn destination(
    origin: Coordinate,
    bearing_deg: f64,
    meters: f64,
) -> Result<Coordinate, GeometryError> {
    let angular_distance = meters / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular_distance.cos()
        + lat1.cos() * angular_distance.sin() * bearing.cos())
    .asin();
    let lon2 = lon1
        + (bearing.sin() * angular_distance.sin() * lat1.cos())
            .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// True iff `d` is within `radius_m` of `center`, treating `d == radius_m`
/// as inside (see `spec.md` §8 boundary cases).
pub fn within_radius(point: Coordinate, center: Coordinate, radius_m: f64) -> bool {
    haversine_meters(point, center) <= radius_m + f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn haversine_identical_points_is_zero() {
        let p = c(40.44, -79.94);
        assert!(haversine_meters(p, p) < DISTANCE_EPSILON_M);
    }

    #[test]
    fn haversine_known_distance_approx() {
        // Roughly 1 degree of latitude at the equator is ~111.2 km.
        let a = c(0.0, 0.0);
        let b = c(1.0, 0.0);
        let d = haversine_meters(a, b);
        assert!((d - 111_195.0).abs() < 500.0);
    }

    #[test]
    fn triangle_rejects_two_point_polygon() {
        let poly = vec![c(0.0, 0.0), c(1.0, 0.0)];
        assert!(point_in_polygon(c(0.5, 0.5), &poly).is_err());
    }

    #[test]
    fn triangle_accepts_three_point_polygon() {
        let poly = vec![c(0.0, 0.0), c(0.0, 2.0), c(2.0, 1.0)];
        assert!(point_in_polygon(c(1.0, 1.0), &poly).unwrap());
        assert!(!point_in_polygon(c(-1.0, -1.0), &poly).unwrap());
    }

    #[test]
    fn point_on_edge_counts_as_inside() {
        let poly = vec![c(0.0, 0.0), c(0.0, 2.0), c(2.0, 2.0), c(2.0, 0.0)];
        // Midpoint of the bottom edge.
        assert!(point_in_polygon(c(0.0, 1.0), &poly).unwrap());
    }

    #[test]
    fn within_radius_boundary_is_inside() {
        let center = c(40.0, -79.0);
        let d = haversine_meters(center, c(40.001, -79.0));
        assert!(within_radius(c(40.001, -79.0), center, d));
    }

    #[test]
    fn destination_and_bearing_round_trip() {
        let origin = c(40.0, -79.0);
        let dest = destination(origin, 45.0, 1000.0).unwrap();
        let back_bearing = bearing_degrees(origin, dest);
        assert!((back_bearing - 45.0).abs() < 1.0);
        let dist = haversine_meters(origin, dest);
        assert!((dist - 1000.0).abs() < 1.0);
    }
}
