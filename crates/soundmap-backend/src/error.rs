//! Backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Retry delay assumed for a 429 without a usable Retry-After header.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 => Self::Unauthorized(msg),
            403 => Self::PermissionDenied(msg),
            404 => Self::NotFound(msg),
            408 => Self::Timeout(msg),
            409 => Self::Conflict(msg),
            429 => Self::RateLimited(DEFAULT_RATE_LIMIT_MS),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::RequestFailed(msg),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(e) => !e.is_builder() && !e.is_decode(),
            BackendError::Timeout(_)
            | BackendError::RateLimited(_)
            | BackendError::ServerError(_, _) => true,
            _ => false,
        }
    }

    /// True if the backend rejected the request before acting on it: the
    /// connection was never established, or the request was rate limited.
    pub fn is_unprocessed(&self) -> bool {
        match self {
            BackendError::Network(e) => e.is_connect(),
            BackendError::RateLimited(_) => true,
            _ => false,
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BackendError::Unauthorized(_) => Some(401),
            BackendError::PermissionDenied(_) => Some(403),
            BackendError::NotFound(_) => Some(404),
            BackendError::Timeout(_) => Some(408),
            BackendError::Conflict(_) => Some(409),
            BackendError::RateLimited(_) => Some(429),
            BackendError::ServerError(status, _) => Some(*status),
            BackendError::RequestFailed(_) => Some(400),
            BackendError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested delay before retrying.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            BackendError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}
