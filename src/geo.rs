use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees (WGS84).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a point only when both coordinates are finite and in range.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        let point = Self::new(latitude, longitude);
        if point.is_valid() {
            Some(point)
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let point = GeoPoint::new(-23.5505, -46.6333);
        assert_eq!(haversine_km(&point, &point), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let sao_paulo = GeoPoint::new(-23.5505, -46.6333);
        let rio = GeoPoint::new(-22.9068, -43.1729);
        let there = haversine_km(&sao_paulo, &rio);
        let back = haversine_km(&rio, &sao_paulo);
        assert!((there - back).abs() < 1e-9);
        // roughly 360 km apart
        assert!((340.0..380.0).contains(&there), "got {there}");
    }

    #[test]
    fn half_degree_of_longitude_on_equator() {
        let origin = GeoPoint::new(0.0, 0.0);
        let far = haversine_km(&origin, &GeoPoint::new(0.0, 0.5));
        let near = haversine_km(&origin, &GeoPoint::new(0.0, 0.1));
        assert!((far - 55.6).abs() < 0.2, "got {far}");
        assert!((near - 11.1).abs() < 0.1, "got {near}");
    }

    #[test]
    fn checked_rejects_out_of_range() {
        assert!(GeoPoint::checked(91.0, 0.0).is_none());
        assert!(GeoPoint::checked(0.0, -180.5).is_none());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_none());
        assert!(GeoPoint::checked(45.0, 179.9).is_some());
    }
}
