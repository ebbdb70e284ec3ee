//! Nearby feed and map listing with an offline fallback.
//!
//! Every backend fetch is bounded by one deadline. Successful fetches are
//! merged into an in-memory snapshot; when the backend is slow or down the
//! snapshot is served instead and the result is flagged as stale. The range
//! filter always runs on whatever clips were obtained, so stale data never
//! surfaces a clip that is out of range.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use soundmap_backend::{BackendResult, ClipStore};
use soundmap_models::{Clip, ClipId, GeoPoint};
use soundmap_proximity::{haversine_m, nearby_feed, RankedClip};

use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_feed_fallback, record_feed_size};

/// Upper bound on clips kept in the fallback snapshot.
pub const MAX_SNAPSHOT_CLIPS: usize = 5000;

/// Result of a feed query.
#[derive(Debug, Clone)]
pub struct Feed<T> {
    pub clips: Vec<T>,
    /// True if the clips came from the snapshot instead of the backend.
    pub stale: bool,
}

/// Why a backend call was abandoned.
#[derive(Debug)]
pub enum FetchFailure {
    Timeout,
    Backend(soundmap_backend::BackendError),
}

impl FetchFailure {
    fn reason(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => "timeout",
            FetchFailure::Backend(_) => "backend_error",
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "backend deadline exceeded"),
            FetchFailure::Backend(e) => write!(f, "{}", e),
        }
    }
}

/// Serves ranked nearby clips and the map listing.
#[derive(Clone)]
pub struct FeedService {
    clips: Arc<dyn ClipStore>,
    deadline: Duration,
    snapshot: Arc<RwLock<HashMap<ClipId, Clip>>>,
}

impl FeedService {
    pub fn new(clips: Arc<dyn ClipStore>, deadline: Duration) -> Self {
        Self {
            clips,
            deadline,
            snapshot: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Run a backend call under the configured deadline.
    pub async fn within_deadline<T, F>(&self, fut: F) -> Result<T, FetchFailure>
    where
        F: Future<Output = BackendResult<T>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FetchFailure::Backend(e)),
            Err(_) => Err(FetchFailure::Timeout),
        }
    }

    /// In-range clips around `position`, ranked, minus `excluded`.
    pub async fn nearby(
        &self,
        position: GeoPoint,
        max_distance_m: f64,
        excluded: &HashSet<ClipId>,
        now: DateTime<Utc>,
    ) -> ApiResult<Feed<RankedClip>> {
        let fetched = self
            .within_deadline(self.clips.fetch_clips_near(position, max_distance_m))
            .await;

        let (candidates, stale) = match fetched {
            Ok(clips) => {
                self.remember(&clips).await;
                (clips, false)
            }
            Err(failure) => (self.fallback("nearby", failure).await?, true),
        };

        // Same search-distance cut for fresh rows and the snapshot
        let candidates: Vec<Clip> = candidates
            .into_iter()
            .filter(|clip| haversine_m(position, clip.position()) <= max_distance_m)
            .collect();

        let clips = nearby_feed(position, &candidates, excluded, now);
        debug!(
            candidates = candidates.len(),
            in_range = clips.len(),
            stale,
            "Built nearby feed"
        );
        record_feed_size("nearby", clips.len());
        Ok(Feed { clips, stale })
    }

    /// Newest clips first, for the map.
    pub async fn listing(&self, limit: usize) -> ApiResult<Feed<Clip>> {
        let fetched = self
            .within_deadline(self.clips.fetch_all_clips(limit))
            .await;

        let feed = match fetched {
            Ok(clips) => {
                self.remember(&clips).await;
                Feed {
                    clips,
                    stale: false,
                }
            }
            Err(failure) => {
                let mut clips = self.fallback("listing", failure).await?;
                clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                clips.truncate(limit);
                Feed { clips, stale: true }
            }
        };

        record_feed_size("listing", feed.clips.len());
        Ok(feed)
    }

    /// Merge freshly fetched clips into the snapshot.
    pub async fn remember(&self, clips: &[Clip]) {
        let mut snapshot = self.snapshot.write().await;
        if snapshot.len() + clips.len() > MAX_SNAPSHOT_CLIPS {
            snapshot.clear();
        }
        for clip in clips.iter().take(MAX_SNAPSHOT_CLIPS) {
            snapshot.insert(clip.id.clone(), clip.clone());
        }
    }

    /// Number of clips currently held for fallback.
    pub async fn snapshot_len(&self) -> usize {
        self.snapshot.read().await.len()
    }

    async fn fallback(&self, endpoint: &str, failure: FetchFailure) -> ApiResult<Vec<Clip>> {
        record_feed_fallback(endpoint, failure.reason());

        let snapshot = self.snapshot.read().await;
        if snapshot.is_empty() {
            warn!(endpoint, error = %failure, "Backend unavailable and no snapshot to fall back to");
            return Err(match failure {
                FetchFailure::Backend(e) => ApiError::Backend(e),
                FetchFailure::Timeout => ApiError::unavailable("backend deadline exceeded"),
            });
        }

        warn!(
            endpoint,
            error = %failure,
            snapshot = snapshot.len(),
            "Backend unavailable, serving last good snapshot"
        );
        Ok(snapshot.values().cloned().collect())
    }
}
