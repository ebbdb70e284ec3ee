//! Auto-play session for a single listener.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use soundmap_models::{Clip, ClipId, GeoPoint, Preference, DEFAULT_CENTER};
use tracing::debug;

use crate::ranking::{nearby_feed, RankedClip};

/// Tracks the listener's position and what they already heard, and picks
/// the next clip to play as they walk.
///
/// Candidates are recomputed from scratch on every call; there is no
/// debouncing of location updates.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    last_known: Option<GeoPoint>,
    now_playing: Option<ClipId>,
    played: HashSet<ClipId>,
    skipped: HashSet<ClipId>,
    disliked: HashSet<ClipId>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session seeded with the listener's persisted dislikes.
    pub fn with_disliked(disliked: impl IntoIterator<Item = ClipId>) -> Self {
        Self {
            disliked: disliked.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record a location reading. Returns false if the reading was rejected.
    pub fn update_position(&mut self, position: GeoPoint) -> bool {
        if !position.is_valid() {
            debug!(
                lat = position.lat,
                lng = position.lng,
                "Ignoring invalid location reading"
            );
            return false;
        }
        self.last_known = Some(position);
        true
    }

    /// Last valid position, or the city center before the first fix.
    pub fn current_position(&self) -> GeoPoint {
        self.last_known.unwrap_or(DEFAULT_CENTER)
    }

    pub fn has_fix(&self) -> bool {
        self.last_known.is_some()
    }

    pub fn now_playing(&self) -> Option<&ClipId> {
        self.now_playing.as_ref()
    }

    /// Ranked in-range clips not yet played, skipped or disliked.
    pub fn candidates(&self, clips: &[Clip], now: DateTime<Utc>) -> Vec<RankedClip> {
        let excluded: HashSet<ClipId> = self
            .disliked
            .iter()
            .chain(&self.played)
            .chain(&self.skipped)
            .cloned()
            .collect();
        nearby_feed(self.current_position(), clips, &excluded, now)
    }

    /// Best clip to auto-play next, if any.
    pub fn next_clip(&self, clips: &[Clip], now: DateTime<Utc>) -> Option<RankedClip> {
        self.candidates(clips, now).into_iter().next()
    }

    /// Mark a clip as the one currently playing.
    pub fn start(&mut self, clip_id: &ClipId) {
        self.now_playing = Some(clip_id.clone());
    }

    /// Record that a clip finished playing.
    pub fn mark_played(&mut self, clip_id: &ClipId) {
        self.played.insert(clip_id.clone());
        self.clear_if_playing(clip_id);
    }

    pub fn skip(&mut self, clip_id: &ClipId) {
        self.skipped.insert(clip_id.clone());
        self.clear_if_playing(clip_id);
    }

    pub fn dislike(&mut self, clip_id: &ClipId) {
        self.disliked.insert(clip_id.clone());
        self.clear_if_playing(clip_id);
    }

    /// Liking a clip lifts a previous dislike.
    pub fn like(&mut self, clip_id: &ClipId) {
        self.disliked.remove(clip_id);
    }

    pub fn record(&mut self, clip_id: &ClipId, preference: Preference) {
        match preference {
            Preference::Like => self.like(clip_id),
            Preference::Dislike => self.dislike(clip_id),
            Preference::Skip => self.skip(clip_id),
        }
    }

    /// Allow already heard clips to be played again. Skips and dislikes stay.
    pub fn reset_played(&mut self) {
        self.played.clear();
    }

    pub fn is_disliked(&self, clip_id: &ClipId) -> bool {
        self.disliked.contains(clip_id)
    }

    fn clear_if_playing(&mut self, clip_id: &ClipId) {
        if self.now_playing.as_ref() == Some(clip_id) {
            self.now_playing = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, lat: f64, lng: f64, likes: u32) -> Clip {
        Clip {
            id: ClipId::from(id),
            title: id.to_string(),
            url: format!("https://cdn.example.org/{}.webm", id),
            lat,
            lng,
            radius: 100.0,
            like_count: likes,
            dislike_count: 0,
            owner: None,
            created_at: None,
        }
    }

    fn mitte_clips() -> Vec<Clip> {
        vec![
            clip("quiet", 52.5200, 13.4050, 0),
            clip("loud", 52.5201, 13.4050, 3),
            clip("kreuzberg", 52.4990, 13.4030, 9),
        ]
    }

    #[test]
    fn test_position_fallback() {
        let mut session = PlaybackSession::new();
        assert!(!session.has_fix());
        assert_eq!(session.current_position(), DEFAULT_CENTER);

        let alex = GeoPoint::new(52.5219, 13.4132);
        assert!(session.update_position(alex));
        assert!(!session.update_position(GeoPoint::new(f64::NAN, 13.4)));
        assert!(!session.update_position(GeoPoint::new(120.0, 13.4)));
        assert_eq!(session.current_position(), alex);
    }

    #[test]
    fn test_next_clip_picks_best_in_range() {
        let mut session = PlaybackSession::new();
        session.update_position(GeoPoint::new(52.5200, 13.4050));
        let next = session.next_clip(&mitte_clips(), Utc::now()).unwrap();
        assert_eq!(next.clip.id.as_str(), "loud");
    }

    #[test]
    fn test_played_and_skipped_are_not_repeated() {
        let clips = mitte_clips();
        let mut session = PlaybackSession::new();
        session.update_position(GeoPoint::new(52.5200, 13.4050));

        let loud = ClipId::from("loud");
        session.start(&loud);
        assert_eq!(session.now_playing(), Some(&loud));
        session.mark_played(&loud);
        assert!(session.now_playing().is_none());

        let next = session.next_clip(&clips, Utc::now()).unwrap();
        assert_eq!(next.clip.id.as_str(), "quiet");

        session.record(&ClipId::from("quiet"), Preference::Skip);
        assert!(session.next_clip(&clips, Utc::now()).is_none());

        session.reset_played();
        let replay = session.next_clip(&clips, Utc::now()).unwrap();
        assert_eq!(replay.clip.id.as_str(), "loud");
    }

    #[test]
    fn test_like_lifts_dislike() {
        let clips = mitte_clips();
        let loud = ClipId::from("loud");
        let mut session = PlaybackSession::with_disliked([loud.clone()]);
        session.update_position(GeoPoint::new(52.5200, 13.4050));

        assert_eq!(
            session.next_clip(&clips, Utc::now()).unwrap().clip.id.as_str(),
            "quiet"
        );

        session.record(&loud, Preference::Like);
        assert!(!session.is_disliked(&loud));
        assert_eq!(
            session.next_clip(&clips, Utc::now()).unwrap().clip.id.as_str(),
            "loud"
        );
    }

    #[test]
    fn test_walking_surfaces_new_clips() {
        let clips = mitte_clips();
        let mut session = PlaybackSession::new();
        session.update_position(GeoPoint::new(52.4990, 13.4030));
        let next = session.next_clip(&clips, Utc::now()).unwrap();
        assert_eq!(next.clip.id.as_str(), "kreuzberg");
    }
}
