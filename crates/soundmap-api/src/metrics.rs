//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the render handle.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "soundmap_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "soundmap_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "soundmap_http_requests_in_flight";

    // Feed metrics
    pub const FEED_FALLBACKS_TOTAL: &str = "soundmap_feed_fallbacks_total";
    pub const FEED_CLIPS_RETURNED: &str = "soundmap_feed_clips_returned";

    // Listener actions
    pub const PREFERENCES_TOTAL: &str = "soundmap_preferences_total";
    pub const UPLOAD_BYTES: &str = "soundmap_upload_bytes";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "soundmap_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a response served from the last good snapshot.
pub fn record_feed_fallback(endpoint: &str, reason: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::FEED_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record how many clips a feed response carried.
pub fn record_feed_size(endpoint: &str, count: usize) {
    let labels = [("endpoint", endpoint.to_string())];
    histogram!(names::FEED_CLIPS_RETURNED, &labels).record(count as f64);
}

/// Record a like/dislike that changed a profile.
pub fn record_preference(preference: &str) {
    let labels = [("preference", preference.to_string())];
    counter!(names::PREFERENCES_TOTAL, &labels).increment(1);
}

pub fn record_upload(bytes: usize) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Replace clip IDs in paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let replaced = if previous == "clips" && !segment.is_empty() && segment != "nearby" {
                ":id"
            } else {
                segment
            };
            previous = segment;
            replaced
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}
