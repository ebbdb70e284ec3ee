//! Application state.

use std::sync::Arc;

use soundmap_backend::{
    AudioStorage, AudioStore, BackendClient, ClipRepository, ClipStore, ProfileRepository,
    ProfileStore,
};
use tracing::{info, warn};

use crate::auth::JwtVerifier;
use crate::config::ApiConfig;
use crate::middleware::ClientRateLimiter;
use crate::services::FeedService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub clips: Arc<dyn ClipStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub audio: Arc<dyn AudioStore>,
    pub jwt: Option<Arc<JwtVerifier>>,
    pub feed: FeedService,
    pub rate_limiter: ClientRateLimiter,
}

impl AppState {
    /// Create new application state backed by the hosted backend.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let client = BackendClient::from_env()?;
        info!(base_url = %client.config().base_url, "Backend client initialized");

        let clips: Arc<dyn ClipStore> = Arc::new(ClipRepository::new(client.clone()));
        let profiles: Arc<dyn ProfileStore> = Arc::new(ProfileRepository::new(client.clone()));
        let audio: Arc<dyn AudioStore> = Arc::new(AudioStorage::new(client));

        Ok(Self::with_stores(config, clips, profiles, audio))
    }

    /// Create state over arbitrary store implementations.
    pub fn with_stores(
        config: ApiConfig,
        clips: Arc<dyn ClipStore>,
        profiles: Arc<dyn ProfileStore>,
        audio: Arc<dyn AudioStore>,
    ) -> Self {
        let jwt = match config.jwt_secret.as_deref() {
            Some(secret) => Some(Arc::new(JwtVerifier::new(secret))),
            None => {
                warn!("BACKEND_JWT_SECRET not set, authenticated endpoints will reject all requests");
                None
            }
        };

        let feed = FeedService::new(clips.clone(), config.feed.backend_deadline);
        let rate_limiter = ClientRateLimiter::new(config.rate_limit_rps, config.rate_limit_burst)
            .trust_proxy_headers(config.trust_proxy_headers);

        Self {
            config: Arc::new(config),
            clips,
            profiles,
            audio,
            jwt,
            feed,
            rate_limiter,
        }
    }
}
