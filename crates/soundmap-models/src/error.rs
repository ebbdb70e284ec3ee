//! Model validation errors.

use thiserror::Error;

/// Result type for model validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised when a user-supplied model fails validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field values: {0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error("Invalid audio URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid position: lat={lat}, lng={lng}")]
    InvalidPosition { lat: f64, lng: f64 },
}
