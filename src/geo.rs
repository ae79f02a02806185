// Distance helpers for stop and shape matching.

const EARTH_RADIUS_KM: f64 = 6371.0;

pub const NEAR_TOLERANCE_DEG: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }
}

/// Haversine distance in kilometres.
pub fn great_circle_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Rectangular proximity test in degree space. Both differences must be
/// strictly below their tolerance.
pub fn is_near(a: Coord, b: Coord, lat_tolerance: f64, lon_tolerance: f64) -> bool {
    (a.lat - b.lat).abs() < lat_tolerance && (a.lon - b.lon).abs() < lon_tolerance
}

/// Planar squared distance in degrees, only meaningful for ranking.
pub fn squared_degree_distance(a: Coord, b: Coord) -> f64 {
    (a.lat - b.lat).powi(2) + (a.lon - b.lon).powi(2)
}
