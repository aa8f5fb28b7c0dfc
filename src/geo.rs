//! Great-circle distance on live party and incident coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers (haversine reference value).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A live position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Haversine great-circle distance between two points, in kilometers.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin() * (d_lng / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two [`GeoPoint`]s, in kilometers.
pub fn distance_between(a: GeoPoint, b: GeoPoint) -> f64 {
    distance_km(a.lat, a.lng, b.lat, b.lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let d = distance_km(28.6139, 77.2090, 28.6139, 77.2090);
        assert!(d.abs() < 1e-9, "expected 0, got {}", d);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_km(28.6139, 77.2090, 19.0760, 72.8777);
        let ba = distance_km(19.0760, 72.8777, 28.6139, 77.2090);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn delhi_to_mumbai_reference_distance() {
        // Known geodesic: roughly 1150-1160 km.
        let d = distance_km(28.6139, 77.2090, 19.0760, 72.8777);
        assert!((1150.0..1160.0).contains(&d), "got {}", d);
    }

    #[test]
    fn short_hops_are_sub_kilometer() {
        // ~0.001 degrees of latitude is about 111 meters.
        let d = distance_km(28.6139, 77.2090, 28.6149, 77.2090);
        assert!(d > 0.05 && d < 0.2, "got {}", d);
    }
}
