//! Backend metrics collection.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total backend requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "soundmap_backend_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "soundmap_backend_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "soundmap_backend_latency_seconds";

    /// Rows dropped because they could not be decoded.
    pub const MALFORMED_ROWS_TOTAL: &str = "soundmap_backend_malformed_rows_total";
}

/// Record metrics for a completed backend request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record rows skipped while decoding a listing.
pub fn record_malformed_rows(table: &str, count: usize) {
    counter!(
        names::MALFORMED_ROWS_TOTAL,
        "table" => table.to_string()
    )
    .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            names::REQUESTS_TOTAL,
            names::RETRIES_TOTAL,
            names::LATENCY_SECONDS,
            names::MALFORMED_ROWS_TOTAL,
        ] {
            assert!(name.starts_with("soundmap_backend_"), "{}", name);
        }
    }
}
