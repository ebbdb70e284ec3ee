//! Shared data models for SoundMap Berlin.
//!
//! This crate provides Serde-serializable types for:
//! - Geolocated audio clips and upload requests
//! - Listener positions (WGS84)
//! - User profiles and like/dislike preferences

pub mod clip;
pub mod error;
pub mod position;
pub mod profile;

// Re-export common types
pub use clip::{Clip, ClipId, NewClip, DEFAULT_RADIUS_M, MAX_RADIUS_M, MIN_RADIUS_M};
pub use error::{ValidationError, ValidationResult};
pub use position::{GeoPoint, DEFAULT_CENTER};
pub use profile::{Preference, Profile, ANONYMOUS_DISPLAY_NAME};
