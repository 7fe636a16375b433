//! Common types for the navigation environment abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in decimal degrees.
///
/// Latitude is always within [-90, 90] and longitude within [-180, 180];
/// both constructors and deserialization reject anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = EnvError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Creates a validated point.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EnvError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(EnvError::InvalidCoordinate { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    /// Latitude in decimal degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns `[lng, lat]`, the axis order routing providers expect.
    pub fn to_lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// One update from the platform location capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Reported position
    pub point: GeoPoint,

    /// Horizontal accuracy radius in meters, when the platform reports one
    pub accuracy_m: Option<f64>,
}

impl LocationFix {
    /// Creates a fix without accuracy information.
    pub fn new(point: GeoPoint) -> Self {
        Self {
            point,
            accuracy_m: None,
        }
    }

    /// Attaches an accuracy radius.
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Handle identifying one continuous location watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatchId(pub u64);

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_accepts_range_limits() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_geo_point_rejects_out_of_range() {
        assert!(matches!(
            GeoPoint::new(90.5, 0.0),
            Err(EnvError::InvalidCoordinate { .. })
        ));
        assert!(GeoPoint::new(0.0, -180.01).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_geo_point_deserialize_validates() {
        let ok: GeoPoint = serde_json::from_str(r#"{"latitude": 62.39, "longitude": 17.3}"#).unwrap();
        assert_eq!(ok.latitude(), 62.39);

        let bad = serde_json::from_str::<GeoPoint>(r#"{"latitude": 120.0, "longitude": 17.3}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_lng_lat_order() {
        let p = GeoPoint::new(60.0, 18.0).unwrap();
        assert_eq!(p.to_lng_lat(), [18.0, 60.0]);
    }
}
