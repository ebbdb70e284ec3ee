//! Geolocated audio clip models.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ValidationError, ValidationResult};
use crate::position::GeoPoint;

/// Playback radius applied when an upload does not specify one.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

/// Smallest playback radius accepted for uploads.
pub const MIN_RADIUS_M: f64 = 5.0;

/// Largest playback radius accepted for uploads.
pub const MAX_RADIUS_M: f64 = 1000.0;

/// Opaque clip identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Generate a new random clip ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClipId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A geolocated audio recording with a playback radius.
///
/// Rows coming back from the backend are not trusted: missing coordinates
/// become NaN (and are later treated as out of range), a missing or unparsable
/// `created_at` becomes `None`, and a missing radius falls back to
/// [`DEFAULT_RADIUS_M`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    #[serde(deserialize_with = "deserialize_clip_id")]
    pub id: ClipId,

    #[serde(default)]
    pub title: String,

    /// Public URL of the stored audio asset.
    #[serde(default)]
    pub url: String,

    #[serde(default = "nan", deserialize_with = "deserialize_coordinate")]
    pub lat: f64,

    #[serde(default = "nan", deserialize_with = "deserialize_coordinate")]
    pub lng: f64,

    /// Playback geofence in meters.
    #[serde(default = "default_radius", deserialize_with = "deserialize_radius")]
    pub radius: f64,

    #[serde(default)]
    pub like_count: u32,

    #[serde(default)]
    pub dislike_count: u32,

    /// Uploading user, if any.
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

fn nan() -> f64 {
    f64::NAN
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_M
}

impl Clip {
    /// Position of the clip.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// True if the clip carries usable coordinates.
    pub fn has_valid_position(&self) -> bool {
        self.position().is_valid()
    }

    /// Whether `user_id` uploaded this clip.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.as_deref() == Some(user_id)
    }
}

/// Metadata submitted when a user uploads a new clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct NewClip {
    #[validate(length(min = 1, max = 120))]
    pub title: String,

    /// Public URL returned by the audio upload.
    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[serde(default = "default_radius")]
    #[validate(range(min = "MIN_RADIUS_M", max = "MAX_RADIUS_M"))]
    pub radius: f64,
}

impl NewClip {
    /// Validate field ranges, coordinates and the audio URL scheme.
    pub fn check(&self) -> ValidationResult<()> {
        self.validate()?;
        GeoPoint::new(self.lat, self.lng).validated()?;
        if !self.radius.is_finite() {
            return Err(ValidationError::InvalidPosition {
                lat: self.lat,
                lng: self.lng,
            });
        }

        let parsed = url::Url::parse(self.url.trim())
            .map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    /// Build the clip record stored by the backend.
    pub fn into_clip(self, owner: Option<String>) -> Clip {
        Clip {
            id: ClipId::new(),
            title: self.title.trim().to_string(),
            url: self.url.trim().to_string(),
            lat: self.lat,
            lng: self.lng,
            radius: self.radius,
            like_count: 0,
            dislike_count: 0,
            owner,
            created_at: Some(Utc::now()),
        }
    }
}

// =============================================================================
// Lenient deserializers
// =============================================================================

/// Accept string or integer primary keys.
fn deserialize_clip_id<'de, D>(deserializer: D) -> Result<ClipId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::String(s) => Ok(ClipId(s)),
        serde_json::Value::Number(n) => Ok(ClipId(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "invalid clip id: {}",
            other
        ))),
    }
}

/// Null, missing or unparsable coordinates become NaN.
fn deserialize_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(json_to_f64).unwrap_or(f64::NAN))
}

fn deserialize_radius<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(json_to_f64).unwrap_or(DEFAULT_RADIUS_M))
}

fn json_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Missing or unparsable timestamps become `None`.
fn deserialize_lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_timestamp))
}

/// Parse RFC 3339 and the Postgres text formats the backend emits.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
