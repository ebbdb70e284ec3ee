//! Listener and clip positions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Fallback center (Berlin Mitte) used before the device reports a position.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: 52.5200,
    lng: 13.4050,
};

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True if both coordinates are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Return the point if valid, otherwise an error carrying the raw values.
    pub fn validated(self) -> ValidationResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ValidationError::InvalidPosition {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        DEFAULT_CENTER
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_center_is_berlin() {
        let center = GeoPoint::default();
        assert_eq!(center.lat, 52.5200);
        assert_eq!(center.lng, 13.4050);
        assert!(center.is_valid());
    }

    #[test]
    fn test_rejects_non_finite_and_out_of_bounds() {
        assert!(!GeoPoint::new(f64::NAN, 13.4).is_valid());
        assert!(!GeoPoint::new(52.5, f64::INFINITY).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
    }

    #[test]
    fn test_validated_reports_values() {
        let err = GeoPoint::new(f64::NAN, 1.0).validated().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPosition { .. }));
    }
}
