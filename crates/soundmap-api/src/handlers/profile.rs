//! Profile handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use soundmap_models::Profile;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Fetch the caller's profile, creating it on first access.
pub(crate) async fn load_or_create_profile(
    state: &AppState,
    user: &AuthUser,
) -> ApiResult<Profile> {
    if let Some(profile) = state.profiles.get_profile(&user.user_id).await? {
        return Ok(profile);
    }

    let profile = state
        .profiles
        .upsert_profile(&Profile::new(user.user_id.clone(), user.is_anonymous))
        .await?;
    info!(user_id = %user.user_id, anonymous = user.is_anonymous, "Created profile");
    Ok(profile)
}

/// Get the caller's profile.
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Profile>> {
    Ok(Json(load_or_create_profile(&state, &user).await?))
}

/// Profile update request.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

/// Update the caller's display name.
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let mut profile = load_or_create_profile(&state, &user).await?;
    profile.set_display_name(&request.display_name);

    let profile = state.profiles.upsert_profile(&profile).await?;
    Ok(Json(profile))
}
