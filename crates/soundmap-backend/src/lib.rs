//! Backend-as-a-service client for SoundMap.
//!
//! This crate provides:
//! - A REST client with one centralized retry policy
//! - Typed repositories for clips and profiles
//! - Audio object storage with public URLs
//! - Store traits the API depends on instead of concrete clients

pub mod client;
pub mod error;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod storage;
pub mod store;

pub use client::{BackendClient, BackendConfig};
pub use error::{BackendError, BackendResult};
pub use repos::{ClipRepository, ProfileRepository, NEARBY_ROW_LIMIT};
pub use retry::{Idempotency, RetryPolicy, Retryable};
pub use storage::{audio_extension, recording_path, AudioStorage};
pub use store::{AudioStore, ClipStore, ProfileStore};
