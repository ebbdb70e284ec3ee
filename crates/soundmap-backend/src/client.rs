//! Backend REST client.
//!
//! Thin wrapper over the PostgREST-style REST API and the object storage
//! API of the hosted backend:
//! - HTTP client tuning (pooling, timeouts)
//! - One retry policy for every call
//! - Observability (tracing spans, metrics)

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use crate::error::{BackendError, BackendResult, DEFAULT_RATE_LIMIT_MS};
use crate::metrics::record_request;
use crate::retry::{Idempotency, RetryPolicy};

// =============================================================================
// Configuration
// =============================================================================

/// Backend client configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Storage bucket holding uploaded audio
    pub audio_bucket: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry policy
    pub retry: RetryPolicy,
}

impl BackendConfig {
    /// Create config from environment variables.
    pub fn from_env() -> BackendResult<Self> {
        let base_url = std::env::var("BACKEND_URL")
            .map_err(|_| BackendError::config("BACKEND_URL must be set"))?;
        if base_url.trim().is_empty() {
            return Err(BackendError::config("BACKEND_URL cannot be empty"));
        }

        let api_key = std::env::var("BACKEND_ANON_KEY")
            .map_err(|_| BackendError::config("BACKEND_ANON_KEY must be set"))?;
        if api_key.trim().is_empty() {
            return Err(BackendError::config("BACKEND_ANON_KEY cannot be empty"));
        }

        let timeout_secs: u64 = std::env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        let connect_timeout_secs: u64 = std::env::var("BACKEND_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key,
            audio_bucket: std::env::var("BACKEND_AUDIO_BUCKET")
                .unwrap_or_else(|_| "audio-clips".to_string()),
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryPolicy::from_env(),
        })
    }

    /// Config pointing at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            audio_bucket: "audio-clips".to_string(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Backend REST client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    config: BackendConfig,
}

impl BackendClient {
    /// Create a new backend client.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| BackendError::config("BACKEND_ANON_KEY is not a valid header value"))?;
        headers.insert("apikey", key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("soundmap-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BackendError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> BackendResult<Self> {
        Self::new(BackendConfig::from_env()?)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    // =========================================================================
    // URLs
    // =========================================================================

    /// Table endpoint.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    /// Stored procedure endpoint.
    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.config.base_url, function)
    }

    /// Upload endpoint for an object.
    pub fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            bucket,
            encode_path(path)
        )
    }

    /// Public download URL for an object in a public bucket.
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            bucket,
            encode_path(path)
        )
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send a request built by `build`, retrying per the configured policy.
    ///
    /// `build` is called once per attempt. Non-success statuses become
    /// [`BackendError`]s; the successful response is returned unread.
    pub async fn send_with_retry<F>(
        &self,
        operation: &str,
        idempotency: Idempotency,
        build: F,
    ) -> BackendResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.execute_request(operation, async {
            self.config
                .retry
                .run_for(operation, idempotency, || async {
                    let response = build(&self.http)
                        .bearer_auth(&self.config.api_key)
                        .send()
                        .await
                        .map_err(BackendError::Network)?;
                    let status = response.status();
                    if status.is_success() {
                        Ok(response)
                    } else {
                        Err(Self::handle_error_response(status, response).await)
                    }
                })
                .await
        })
        .await
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> BackendResult<T> {
        let response = self
            .send_with_retry(operation, Idempotency::Idempotent, |http| {
                http.get(url).query(query)
            })
            .await?;
        decode(response).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(
        &self,
        operation: &str,
        url: &str,
        body: &B,
        prefer: Option<&str>,
        idempotency: Idempotency,
    ) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send_with_retry(operation, idempotency, |http| {
                with_prefer(http.post(url).json(body), prefer)
            })
            .await?;
        decode(response).await
    }

    /// POST a JSON body, ignoring the response body.
    pub async fn post_json_unit<B>(
        &self,
        operation: &str,
        url: &str,
        body: &B,
        idempotency: Idempotency,
    ) -> BackendResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_with_retry(operation, idempotency, |http| http.post(url).json(body))
            .await?;
        Ok(())
    }

    /// POST raw bytes with the given content type.
    ///
    /// Object creation answers a replay with 409, so it is sent at most once
    /// unless the first attempt never reached the server.
    pub async fn post_bytes(
        &self,
        operation: &str,
        url: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> BackendResult<()> {
        self.send_with_retry(operation, Idempotency::NonIdempotent, |http| {
            http.post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes.to_vec())
        })
        .await?;
        Ok(())
    }

    async fn execute_request<T, F>(&self, operation: &str, fut: F) -> BackendResult<T>
    where
        F: std::future::Future<Output = BackendResult<T>>,
    {
        let span = info_span!("backend_request", operation = %operation);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);
        debug!(operation = %operation, status, latency_ms, "Backend request finished");

        result
    }

    async fn handle_error_response(status: StatusCode, response: Response) -> BackendError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(DEFAULT_RATE_LIMIT_MS);
            return BackendError::RateLimited(retry_after);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        BackendError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

fn with_prefer(builder: RequestBuilder, prefer: Option<&str>) -> RequestBuilder {
    match prefer {
        Some(value) => builder.header("Prefer", value),
        None => builder,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(BackendError::Json)
}

/// Percent-encode each segment of an object path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// =============================================================================
// Tests
// =============================================================================
