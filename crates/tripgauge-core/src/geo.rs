//! Geographic calculations
//!
//! Great-circle distance between two GPS fixes.

use serde::{Deserialize, Serialize};

/// Earth mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self, other)
    }

    /// Point reached by travelling `distance_m` meters along `bearing_deg`
    /// (clockwise from north).
    pub fn offset(&self, distance_m: f64, bearing_deg: f64) -> GeoPoint {
        let angular = distance_m / EARTH_RADIUS_M;
        let bearing = bearing_deg.to_radians();
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
    }
}

/// Great-circle surface distance between two points in meters.
///
/// Uses the atan2 form of the haversine formula, which stays accurate for
/// both very short and near-antipodal separations. Inputs are not validated.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    // Rounding can push h a hair outside [0, 1] near the antipode
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_are_zero() {
        let p = GeoPoint::new(12.9716, 77.5946);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        // 1 degree of arc on a 6371 km sphere
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((haversine_distance(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI;
        assert!((haversine_distance(&a, &b) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (GeoPoint::new(12.9716, 77.5946), GeoPoint::new(12.9720, 77.5950)),
            (GeoPoint::new(51.5074, -0.1278), GeoPoint::new(-33.8688, 151.2093)),
            (GeoPoint::new(-0.5, -45.0), GeoPoint::new(0.5, 45.0)),
            (GeoPoint::new(64.8, 179.9), GeoPoint::new(65.1, -179.8)),
            (GeoPoint::new(89.9, 0.0), GeoPoint::new(-89.9, 180.0)),
        ];
        for (a, b) in pairs {
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            assert!(ab > 0.0);
            assert!((ab - ba).abs() <= ab * 1e-12, "{:?} -> {:?}: {} vs {}", a, b, ab, ba);
        }
    }

    #[test]
    fn test_antimeridian_crossing_is_short() {
        let a = GeoPoint::new(0.0, 179.999);
        let b = GeoPoint::new(0.0, -179.999);
        assert!(haversine_distance(&a, &b) < 250.0);
    }

    #[test]
    fn test_offset_round_trip_distance() {
        let start = GeoPoint::new(28.6139, 77.2090);
        let end = start.offset(100.0, 45.0);
        assert!((start.distance_to(&end) - 100.0).abs() < 1e-6);
    }
}
