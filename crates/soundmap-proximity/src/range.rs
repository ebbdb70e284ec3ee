//! Geofence membership.
//!
//! A clip is in range of a position iff the great-circle distance between
//! them is at most the clip's radius. Malformed input never panics: invalid
//! coordinates and negative or NaN radii simply never match.

use std::collections::HashSet;

use soundmap_models::{Clip, ClipId, GeoPoint};

use crate::distance::haversine_m;

/// Distance from `position` to `clip`, or `None` if either side has unusable coordinates.
pub fn distance_to(position: GeoPoint, clip: &Clip) -> Option<f64> {
    if !position.is_valid() || !clip.has_valid_position() {
        return None;
    }
    Some(haversine_m(position, clip.position()))
}

/// True if `position` lies inside the clip's playback radius.
pub fn is_in_range(position: GeoPoint, clip: &Clip) -> bool {
    distance_to(position, clip).is_some_and(|d| d <= clip.radius)
}

/// Clips audible from `position`, minus `excluded` ones. Input order is kept.
pub fn filter_in_range(
    position: GeoPoint,
    clips: &[Clip],
    excluded: &HashSet<ClipId>,
) -> Vec<Clip> {
    filter_in_range_with_distance(position, clips, excluded)
        .into_iter()
        .map(|(clip, _)| clip)
        .collect()
}

/// Same as [`filter_in_range`] but keeps the computed distance for each clip.
pub fn filter_in_range_with_distance(
    position: GeoPoint,
    clips: &[Clip],
    excluded: &HashSet<ClipId>,
) -> Vec<(Clip, f64)> {
    clips
        .iter()
        .filter(|clip| !excluded.contains(&clip.id))
        .filter_map(|clip| {
            let distance = distance_to(position, clip)?;
            (distance <= clip.radius).then(|| (clip.clone(), distance))
        })
        .collect()
}
