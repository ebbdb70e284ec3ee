//! Like/recency ranking.
//!
//! `score = like_count * 10 + max(0, 100 * e^(-age_days / 30))`
//!
//! Ordering is descending by score and stable, so clips with equal scores
//! keep their input order.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use soundmap_models::{Clip, ClipId, GeoPoint};

use crate::range::filter_in_range_with_distance;

/// Points contributed by each like.
pub const LIKE_WEIGHT: f64 = 10.0;

/// Recency score of a clip created right now.
pub const RECENCY_MAX_SCORE: f64 = 100.0;

/// Decay constant for the recency score, in days.
pub const RECENCY_DECAY_DAYS: f64 = 30.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Fractional days between `created_at` and `now`.
///
/// A missing timestamp counts as brand new. Future timestamps give a
/// negative age.
pub fn age_days(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match created_at {
        Some(created) => (now - created).num_milliseconds() as f64 / MILLIS_PER_DAY,
        None => 0.0,
    }
}

/// Exponentially decayed recency score, never below zero.
pub fn recency_score(age_days: f64) -> f64 {
    let score = RECENCY_MAX_SCORE * (-age_days / RECENCY_DECAY_DAYS).exp();
    if score.is_nan() {
        0.0
    } else {
        score.max(0.0)
    }
}

/// Composite ranking score of a clip at `now`.
pub fn clip_score(clip: &Clip, now: DateTime<Utc>) -> f64 {
    f64::from(clip.like_count) * LIKE_WEIGHT + recency_score(age_days(clip.created_at, now))
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Sort clips by descending score. Equal scores keep their input order.
pub fn rank_clips(clips: Vec<Clip>, now: DateTime<Utc>) -> Vec<Clip> {
    let mut scored: Vec<(f64, Clip)> = clips
        .into_iter()
        .map(|clip| (clip_score(&clip, now), clip))
        .collect();
    scored.sort_by(|a, b| by_score_desc(a.0, b.0));
    scored.into_iter().map(|(_, clip)| clip).collect()
}

/// An in-range clip with its distance from the listener and its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedClip {
    #[serde(flatten)]
    pub clip: Clip,
    pub distance_m: f64,
    pub score: f64,
}

/// Range filter followed by ranking.
pub fn nearby_feed(
    position: GeoPoint,
    clips: &[Clip],
    excluded: &HashSet<ClipId>,
    now: DateTime<Utc>,
) -> Vec<RankedClip> {
    let mut feed: Vec<RankedClip> = filter_in_range_with_distance(position, clips, excluded)
        .into_iter()
        .map(|(clip, distance_m)| RankedClip {
            score: clip_score(&clip, now),
            clip,
            distance_m,
        })
        .collect();
    feed.sort_by(|a, b| by_score_desc(a.score, b.score));
    feed
}
