//! Typed repositories for clips and profiles.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use soundmap_models::{Clip, ClipId, GeoPoint, NewClip, Profile};
use soundmap_proximity::{bounding_box, haversine_m};

use crate::client::BackendClient;
use crate::error::{BackendError, BackendResult};
use crate::retry::Idempotency;
use crate::metrics::record_malformed_rows;
use crate::store::{ClipStore, ProfileStore};

const CLIPS_TABLE: &str = "clips";
const PROFILES_TABLE: &str = "profiles";

/// Hard cap on rows fetched for one proximity query. Rows come back newest
/// first, so a saturated box drops the oldest clips.
pub const NEARBY_ROW_LIMIT: usize = 500;

#[derive(Serialize)]
struct ClipIdArg<'a> {
    clip_id: &'a str,
}

/// Repository for clip rows.
#[derive(Debug, Clone)]
pub struct ClipRepository {
    client: BackendClient,
}

impl ClipRepository {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn increment(&self, function: &str, id: &ClipId) -> BackendResult<()> {
        let url = self.client.rpc_url(function);
        self.client
            .post_json_unit(
                function,
                &url,
                &ClipIdArg { clip_id: id.as_str() },
                Idempotency::NonIdempotent,
            )
            .await
    }
}

#[async_trait]
impl ClipStore for ClipRepository {
    async fn fetch_clips_near(
        &self,
        position: GeoPoint,
        max_distance_m: f64,
    ) -> BackendResult<Vec<Clip>> {
        let position = position
            .validated()
            .map_err(|e| BackendError::request_failed(e.to_string()))?;
        let bbox = bounding_box(position, max_distance_m);

        let url = self.client.rest_url(CLIPS_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("lat", format!("gte.{}", bbox.min_lat)),
            ("lat", format!("lte.{}", bbox.max_lat)),
            ("lng", format!("gte.{}", bbox.min_lng)),
            ("lng", format!("lte.{}", bbox.max_lng)),
            ("order", "created_at.desc".to_string()),
            ("limit", NEARBY_ROW_LIMIT.to_string()),
        ];
        let rows: Vec<serde_json::Value> = self
            .client
            .get_json("fetch_clips_near", &url, &query)
            .await?;

        if rows.len() >= NEARBY_ROW_LIMIT {
            warn!(
                lat = position.lat,
                lng = position.lng,
                max_distance_m,
                limit = NEARBY_ROW_LIMIT,
                "Proximity query hit the row limit, older clips were left out"
            );
        }

        let clips: Vec<Clip> = decode_rows::<Clip>(CLIPS_TABLE, rows)
            .into_iter()
            .filter(|clip| haversine_m(position, clip.position()) <= max_distance_m)
            .collect();
        Ok(clips)
    }

    async fn fetch_all_clips(&self, limit: usize) -> BackendResult<Vec<Clip>> {
        let url = self.client.rest_url(CLIPS_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<serde_json::Value> = self
            .client
            .get_json("fetch_all_clips", &url, &query)
            .await?;
        Ok(decode_rows(CLIPS_TABLE, rows))
    }

    async fn get_clip(&self, id: &ClipId) -> BackendResult<Option<Clip>> {
        let url = self.client.rest_url(CLIPS_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("id", format!("eq.{}", id)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Clip> = self.client.get_json("get_clip", &url, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn create_clip(&self, new: NewClip, owner: Option<String>) -> BackendResult<Clip> {
        let clip = new.into_clip(owner);
        let url = self.client.rest_url(CLIPS_TABLE);
        let inserted: BackendResult<Vec<Clip>> = self
            .client
            .post_json(
                "create_clip",
                &url,
                &clip,
                Some("return=representation"),
                Idempotency::Idempotent,
            )
            .await;

        let rows = match inserted {
            Ok(rows) => rows,
            // A retried insert whose earlier attempt already landed
            Err(BackendError::Conflict(msg)) => match self.get_clip(&clip.id).await? {
                Some(existing) => {
                    debug!(clip_id = %existing.id, "Insert replay conflicted, using stored row");
                    vec![existing]
                }
                None => return Err(BackendError::Conflict(msg)),
            },
            Err(e) => return Err(e),
        };

        let stored = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::invalid_response("insert returned no rows"))?;
        info!(clip_id = %stored.id, "Created clip");
        Ok(stored)
    }

    async fn update_like_count(&self, id: &ClipId) -> BackendResult<()> {
        self.increment("increment_like_count", id).await
    }

    async fn update_dislike_count(&self, id: &ClipId) -> BackendResult<()> {
        self.increment("increment_dislike_count", id).await
    }
}

/// Repository for profile rows.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    client: BackendClient,
}

impl ProfileRepository {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn get_profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        let url = self.client.rest_url(PROFILES_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("id", format!("eq.{}", user_id)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<Profile> = self.client.get_json("get_profile", &url, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        let url = self.client.rest_url(PROFILES_TABLE);
        let rows: Vec<Profile> = self
            .client
            .post_json(
                "upsert_profile",
                &url,
                profile,
                Some("resolution=merge-duplicates,return=representation"),
                Idempotency::Idempotent,
            )
            .await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| profile.clone()))
    }
}

/// Decode rows one by one, dropping (and counting) rows that do not parse.
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<serde_json::Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();

    let skipped = total - decoded.len();
    if skipped > 0 {
        record_malformed_rows(table, skipped);
    }
    decoded
}
