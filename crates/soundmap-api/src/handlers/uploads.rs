//! Audio upload handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use tracing::info;

use soundmap_backend::{audio_extension, recording_path};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics::record_upload;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Object path inside the audio bucket
    pub path: String,
    /// Public URL to pass as `url` when creating the clip
    pub url: String,
}

/// Store a raw audio body under the caller's folder.
pub async fn upload_audio(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let extension = audio_extension(content_type).ok_or_else(|| {
        ApiError::UnsupportedMediaType(format!(
            "'{}' is not a supported audio format",
            content_type
        ))
    })?;

    if body.is_empty() {
        return Err(ApiError::bad_request("Upload body is empty"));
    }

    let size = body.len();
    let path = recording_path(&user.user_id, extension);
    let url = state
        .audio
        .upload_audio(&path, body.to_vec(), content_type)
        .await?;

    record_upload(size);
    info!(user_id = %user.user_id, path = %path, size, "Stored recording");

    Ok((StatusCode::CREATED, Json(UploadResponse { path, url })))
}
