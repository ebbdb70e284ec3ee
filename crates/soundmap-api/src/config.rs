//! API configuration.

use std::str::FromStr;
use std::time::Duration;

/// Nearby feed and map listing settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Search distance used when the client does not send one (meters)
    pub default_distance_m: f64,
    /// Largest search distance a client may request (meters)
    pub max_distance_m: f64,
    /// Map listing size when no limit is given
    pub map_default_limit: usize,
    /// Deadline for each backend call made while building a response
    pub backend_deadline: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_distance_m: 1000.0,
            max_distance_m: 5000.0,
            map_default_limit: 200,
            backend_deadline: Duration::from_millis(4000),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Key rate limits on X-Forwarded-For / X-Real-IP (only behind a proxy that sets them)
    pub trust_proxy_headers: bool,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size (also caps audio uploads)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Secret used to verify backend-issued access tokens
    pub jwt_secret: Option<String>,
    pub feed: FeedConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            trust_proxy_headers: false,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            metrics_enabled: true,
            jwt_secret: None,
            feed: FeedConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let feed = FeedConfig {
            default_distance_m: env_or("FEED_DEFAULT_DISTANCE_M", defaults.feed.default_distance_m),
            max_distance_m: env_or("FEED_MAX_DISTANCE_M", defaults.feed.max_distance_m),
            map_default_limit: env_or("MAP_DEFAULT_LIMIT", defaults.feed.map_default_limit),
            backend_deadline: Duration::from_millis(env_or("BACKEND_DEADLINE_MS", 4000)),
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.trust_proxy_headers),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 30)),
            max_body_size: env_or("MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            jwt_secret: std::env::var("BACKEND_JWT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            feed,
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "API_PORT",
        "CORS_ORIGINS",
        "FEED_MAX_DISTANCE_M",
        "BACKEND_DEADLINE_MS",
        "BACKEND_JWT_SECRET",
        "METRICS_ENABLED",
        "ENVIRONMENT",
        "TRUST_PROXY_HEADERS",
    ];

    fn clear() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.feed.default_distance_m, 1000.0);
        assert_eq!(config.feed.max_distance_m, 5000.0);
        assert_eq!(config.feed.map_default_limit, 200);
        assert_eq!(config.feed.backend_deadline, Duration::from_millis(4000));
        assert!(config.metrics_enabled);
        assert!(config.jwt_secret.is_none());
        assert!(!config.is_production());
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        std::env::set_var("API_PORT", "9100");
        std::env::set_var("CORS_ORIGINS", "https://soundmap.example, http://localhost:3000");
        std::env::set_var("FEED_MAX_DISTANCE_M", "2500");
        std::env::set_var("BACKEND_DEADLINE_MS", "750");
        std::env::set_var("BACKEND_JWT_SECRET", "   ");
        std::env::set_var("METRICS_ENABLED", "false");
        std::env::set_var("ENVIRONMENT", "Production");
        std::env::set_var("TRUST_PROXY_HEADERS", "1");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 9100);
        assert_eq!(
            config.cors_origins,
            vec!["https://soundmap.example", "http://localhost:3000"]
        );
        assert_eq!(config.feed.max_distance_m, 2500.0);
        assert_eq!(config.feed.backend_deadline, Duration::from_millis(750));
        assert!(config.jwt_secret.is_none());
        assert!(!config.metrics_enabled);
        assert!(config.is_production());
        assert!(config.trust_proxy_headers);
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear();
        std::env::set_var("API_PORT", "eighty");
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8000);
        clear();
    }
}
