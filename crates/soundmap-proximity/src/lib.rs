//! Proximity ranking and geofencing for SoundMap clips.
//!
//! This crate provides:
//! - Great-circle distance (haversine, mean Earth radius)
//! - Bounding boxes for coarse backend pre-filtering
//! - The range filter deciding which clips are audible from a position
//! - The like/recency ranking used by every clip listing
//! - A playback session that picks the next clip to auto-play

pub mod distance;
pub mod range;
pub mod ranking;
pub mod session;

pub use distance::{bounding_box, haversine_m, BoundingBox, EARTH_RADIUS_M};
pub use range::{distance_to, filter_in_range, filter_in_range_with_distance, is_in_range};
pub use ranking::{
    age_days, clip_score, nearby_feed, rank_clips, recency_score, RankedClip, LIKE_WEIGHT,
    RECENCY_DECAY_DAYS, RECENCY_MAX_SCORE,
};
pub use session::PlaybackSession;
