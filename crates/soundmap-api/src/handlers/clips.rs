//! Clip feed and listener preference handlers.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use soundmap_models::{Clip, ClipId, GeoPoint, NewClip, Preference};
use soundmap_proximity::RankedClip;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::profile::load_or_create_profile;
use crate::metrics::record_preference;
use crate::state::AppState;

/// Largest map listing a client may request.
pub const MAX_LISTING_LIMIT: usize = 1000;

/// Nearby feed query.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Search distance in meters
    #[serde(default)]
    pub max_distance: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    pub clips: Vec<RankedClip>,
    pub count: usize,
    pub stale: bool,
}

/// Ranked clips the caller is standing inside of.
pub async fn nearby(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Json<NearbyResponse>> {
    let position = GeoPoint::new(query.lat, query.lng).validated()?;
    let max_distance = search_distance(&state, query.max_distance)?;

    let excluded = match &user {
        Some(user) => excluded_for(&state, user).await,
        None => HashSet::new(),
    };

    let feed = state
        .feed
        .nearby(position, max_distance, &excluded, Utc::now())
        .await?;

    Ok(Json(NearbyResponse {
        count: feed.clips.len(),
        clips: feed.clips,
        stale: feed.stale,
    }))
}

fn search_distance(state: &AppState, requested: Option<f64>) -> ApiResult<f64> {
    let feed = &state.config.feed;
    match requested {
        None => Ok(feed.default_distance_m),
        Some(d) if !d.is_finite() || d <= 0.0 => Err(ApiError::bad_request(
            "max_distance must be a positive number of meters",
        )),
        Some(d) => Ok(d.min(feed.max_distance_m)),
    }
}

/// Disliked clip IDs for `user`. A failed lookup degrades to no exclusions.
async fn excluded_for(state: &AppState, user: &AuthUser) -> HashSet<ClipId> {
    match state
        .feed
        .within_deadline(state.profiles.get_profile(&user.user_id))
        .await
    {
        Ok(Some(profile)) => profile.excluded_ids(),
        Ok(None) => HashSet::new(),
        Err(e) => {
            warn!(user_id = %user.user_id, error = %e, "Profile lookup failed, serving feed without exclusions");
            HashSet::new()
        }
    }
}

/// Map listing query.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ClipsResponse {
    pub clips: Vec<Clip>,
    pub count: usize,
    pub stale: bool,
}

/// All clips for the map, newest first.
pub async fn list_clips(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ClipsResponse>> {
    let limit = query
        .limit
        .unwrap_or(state.config.feed.map_default_limit)
        .clamp(1, MAX_LISTING_LIMIT);

    let feed = state.feed.listing(limit).await?;

    Ok(Json(ClipsResponse {
        count: feed.clips.len(),
        clips: feed.clips,
        stale: feed.stale,
    }))
}

/// Store metadata for a clip whose audio was already uploaded.
pub async fn create_clip(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<NewClip>,
) -> ApiResult<(StatusCode, Json<Clip>)> {
    request.check()?;

    let clip = state
        .clips
        .create_clip(request, Some(user.user_id.clone()))
        .await?;

    info!(clip_id = %clip.id, user_id = %user.user_id, "Created clip");
    Ok((StatusCode::CREATED, Json(clip)))
}

#[derive(Debug, Serialize)]
pub struct PreferenceResponse {
    pub clip_id: ClipId,
    pub preference: Preference,
    /// False if the profile already held this preference.
    pub changed: bool,
}

/// Record a like.
pub async fn like_clip(
    State(state): State<AppState>,
    user: AuthUser,
    Path(clip_id): Path<String>,
) -> ApiResult<Json<PreferenceResponse>> {
    react(&state, &user, ClipId::from(clip_id), Preference::Like).await
}

/// Record a dislike. The clip leaves the caller's nearby feed.
pub async fn dislike_clip(
    State(state): State<AppState>,
    user: AuthUser,
    Path(clip_id): Path<String>,
) -> ApiResult<Json<PreferenceResponse>> {
    react(&state, &user, ClipId::from(clip_id), Preference::Dislike).await
}

async fn react(
    state: &AppState,
    user: &AuthUser,
    clip_id: ClipId,
    preference: Preference,
) -> ApiResult<Json<PreferenceResponse>> {
    if state.clips.get_clip(&clip_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Clip {} not found", clip_id)));
    }

    let previous = load_or_create_profile(state, user).await?;
    let mut profile = previous.clone();
    let changed = profile.apply(&clip_id, preference);

    // Counts are bumped once per listener
    if changed {
        state.profiles.upsert_profile(&profile).await?;

        let bumped = match preference {
            Preference::Like => state.clips.update_like_count(&clip_id).await,
            Preference::Dislike => state.clips.update_dislike_count(&clip_id).await,
            Preference::Skip => Ok(()),
        };

        // Undo the profile change so a repeated request bumps the count again
        if let Err(e) = bumped {
            if let Err(restore) = state.profiles.upsert_profile(&previous).await {
                warn!(
                    clip_id = %clip_id,
                    user_id = %user.user_id,
                    error = %restore,
                    "Failed to restore profile after counter update failed"
                );
            }
            return Err(e.into());
        }

        record_preference(preference.as_str());
        info!(clip_id = %clip_id, user_id = %user.user_id, %preference, "Recorded preference");
    }

    Ok(Json(PreferenceResponse {
        clip_id,
        preference,
        changed,
    }))
}
