//! Retry policy with exponential backoff and jitter.
//!
//! Every backend call goes through [`RetryPolicy::run_for`]:
//! - Exponential backoff with full jitter
//! - Respects Retry-After on 429
//! - Configurable attempts, base and max delays
//! - Non-idempotent calls are only repeated if the first attempt never ran

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, SystemTime};

use tracing::{info_span, warn, Instrument};

use crate::error::BackendError;
use crate::metrics::record_retry;

// =============================================================================
// Retryable
// =============================================================================

/// Errors that can tell whether repeating the operation may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// The request was rejected before the server acted on it, so sending
    /// it again cannot duplicate its effect.
    fn is_unprocessed(&self) -> bool {
        false
    }

    /// Delay requested by the server, overriding the computed backoff.
    fn retry_after_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for BackendError {
    fn is_retryable(&self) -> bool {
        BackendError::is_retryable(self)
    }

    fn is_unprocessed(&self) -> bool {
        BackendError::is_unprocessed(self)
    }

    fn retry_after_ms(&self) -> Option<u64> {
        BackendError::retry_after_ms(self)
    }
}

/// Whether repeating a call can duplicate its effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Reads, upserts and inserts keyed by a client-generated ID.
    Idempotent,
    /// Counter bumps and other calls that must run at most once.
    NonIdempotent,
}

// =============================================================================
// Policy
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_or("BACKEND_MAX_RETRIES", defaults.max_retries),
            base_delay_ms: env_or("BACKEND_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_or("BACKEND_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Run an idempotent `op` until it succeeds, fails with a non-retryable
    /// error, or attempts run out. The last error is returned.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_for(operation, Idempotency::Idempotent, op).await
    }

    /// Like [`RetryPolicy::run`], but a [`Idempotency::NonIdempotent`] `op`
    /// is only repeated after errors that prove it never ran.
    pub async fn run_for<T, E, F, Fut>(
        &self,
        operation: &str,
        idempotency: Idempotency,
        op: F,
    ) -> Result<T, E>
    where
        E: Retryable + Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            let span = info_span!("backend_attempt", operation = %operation, attempt = attempt + 1);

            match op().instrument(span).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && may_repeat(&e, idempotency) => {
                    let delay = self.delay_for(attempt, e.retry_after_ms());

                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Backend operation failed, retrying: {}",
                        e
                    );

                    record_retry(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after.min(self.max_delay_ms.max(self.base_delay_ms)));
        }

        let exp_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped = exp_delay.min(self.max_delay_ms);

        // Full jitter from the clock, no rand dependency
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let factor = (nanos % 1000) as f64 / 1000.0;
        let jittered = (capped as f64 * factor) as u64;

        Duration::from_millis(jittered.max(self.base_delay_ms.min(capped)))
    }
}

fn may_repeat<E: Retryable>(error: &E, idempotency: Idempotency) -> bool {
    match idempotency {
        Idempotency::Idempotent => error.is_retryable(),
        Idempotency::NonIdempotent => error.is_unprocessed(),
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Tests
// =============================================================================
