//! Axum HTTP API server for SoundMap Berlin.
//!
//! This crate provides:
//! - The ranked nearby feed with an offline snapshot fallback
//! - Clip creation, audio uploads and like/dislike preferences
//! - Backend-issued JWT verification
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, FeedConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::FeedService;
pub use state::AppState;
