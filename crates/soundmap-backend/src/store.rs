//! Store traits implemented by the repositories.
//!
//! The API depends on these traits rather than on concrete clients so the
//! backend can be swapped out (or faked in tests).

use async_trait::async_trait;
use soundmap_models::{Clip, ClipId, GeoPoint, NewClip, Profile};

use crate::error::BackendResult;

/// Clip persistence.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Clips whose position lies within `max_distance_m` of `position`.
    async fn fetch_clips_near(&self, position: GeoPoint, max_distance_m: f64)
        -> BackendResult<Vec<Clip>>;

    /// Newest clips first, up to `limit`.
    async fn fetch_all_clips(&self, limit: usize) -> BackendResult<Vec<Clip>>;

    async fn get_clip(&self, id: &ClipId) -> BackendResult<Option<Clip>>;

    /// Store a new clip owned by `owner` and return the stored row.
    async fn create_clip(&self, new: NewClip, owner: Option<String>) -> BackendResult<Clip>;

    /// Increment `like_count` by one.
    async fn update_like_count(&self, id: &ClipId) -> BackendResult<()>;

    /// Increment `dislike_count` by one.
    async fn update_dislike_count(&self, id: &ClipId) -> BackendResult<()>;
}

/// Profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> BackendResult<Option<Profile>>;

    /// Insert or merge a profile and return the stored row.
    async fn upsert_profile(&self, profile: &Profile) -> BackendResult<Profile>;
}

/// Audio object storage.
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    async fn upload_audio(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String>;

    /// Public URL for an object path.
    fn public_url(&self, path: &str) -> String;
}
