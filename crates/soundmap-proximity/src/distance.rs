//! Great-circle distance and bounding boxes.

use serde::Serialize;
use soundmap_models::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude on the haversine sphere.
const METERS_PER_DEGREE_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Widening applied to bounding boxes so parallels never clip the circle.
const BOX_MARGIN: f64 = 1.01;

/// Haversine distance between two points, in meters.
///
/// Accurate to well under GPS error at city scale. Non-finite input yields NaN.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push h marginally above 1 for near-antipodal points; NaN passes through
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Axis-aligned lat/lng box enclosing a circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }
}

/// Box around `center` that contains every point within `radius_m`.
///
/// The box is a superset of the circle, so callers still apply the exact
/// range check afterwards.
pub fn bounding_box(center: GeoPoint, radius_m: f64) -> BoundingBox {
    let radius_m = radius_m.max(0.0);
    let lat_change = radius_m * BOX_MARGIN / METERS_PER_DEGREE_LAT;

    let cos_lat = center.lat.to_radians().cos().abs();
    let lng_change = if cos_lat < 1e-6 {
        180.0
    } else {
        lat_change / cos_lat
    };

    BoundingBox {
        min_lat: (center.lat - lat_change).max(-90.0),
        max_lat: (center.lat + lat_change).min(90.0),
        min_lng: (center.lng - lng_change).max(-180.0),
        max_lng: (center.lng + lng_change).min(180.0),
    }
}
