//! Router tests against in-memory stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use soundmap_api::auth::Claims;
use soundmap_api::{create_router, ApiConfig, AppState};
use soundmap_backend::{
    AudioStore, BackendError, BackendResult, ClipStore, ProfileStore,
};
use soundmap_models::{Clip, ClipId, GeoPoint, NewClip, Profile};

const SECRET: &str = "router-test-secret";

// =============================================================================
// In-memory stores
// =============================================================================

#[derive(Default)]
struct MemoryClips {
    clips: Mutex<Vec<Clip>>,
    down: AtomicBool,
    fail_next_increment: AtomicBool,
}

impl MemoryClips {
    fn check_up(&self) -> BackendResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::ServerError(503, "backend down".into()));
        }
        Ok(())
    }

    fn find(&self, id: &ClipId) -> Option<Clip> {
        self.clips.lock().unwrap().iter().find(|c| &c.id == id).cloned()
    }
}

#[async_trait]
impl ClipStore for MemoryClips {
    async fn fetch_clips_near(&self, _: GeoPoint, _: f64) -> BackendResult<Vec<Clip>> {
        self.check_up()?;
        Ok(self.clips.lock().unwrap().clone())
    }

    async fn fetch_all_clips(&self, limit: usize) -> BackendResult<Vec<Clip>> {
        self.check_up()?;
        let mut clips = self.clips.lock().unwrap().clone();
        clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        clips.truncate(limit);
        Ok(clips)
    }

    async fn get_clip(&self, id: &ClipId) -> BackendResult<Option<Clip>> {
        self.check_up()?;
        Ok(self.find(id))
    }

    async fn create_clip(&self, new: NewClip, owner: Option<String>) -> BackendResult<Clip> {
        self.check_up()?;
        let clip = new.into_clip(owner);
        self.clips.lock().unwrap().push(clip.clone());
        Ok(clip)
    }

    async fn update_like_count(&self, id: &ClipId) -> BackendResult<()> {
        if self.fail_next_increment.swap(false, Ordering::SeqCst) {
            return Err(BackendError::ServerError(500, "increment failed".into()));
        }
        let mut clips = self.clips.lock().unwrap();
        let clip = clips
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| BackendError::not_found(id.to_string()))?;
        clip.like_count += 1;
        Ok(())
    }

    async fn update_dislike_count(&self, id: &ClipId) -> BackendResult<()> {
        let mut clips = self.clips.lock().unwrap();
        let clip = clips
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| BackendError::not_found(id.to_string()))?;
        clip.dislike_count += 1;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryProfiles {
    profiles: Mutex<HashMap<String, Profile>>,
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn get_profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(profile.clone())
    }
}

#[derive(Default)]
struct MemoryAudio {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl AudioStore for MemoryAudio {
    async fn upload_audio(&self, path: &str, bytes: Vec<u8>, _: &str) -> BackendResult<String> {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://storage.example.org/audio-clips/{}", path)
    }
}

// =============================================================================
// Harness
// =============================================================================

struct TestApp {
    router: Router,
    clips: Arc<MemoryClips>,
    profiles: Arc<MemoryProfiles>,
    audio: Arc<MemoryAudio>,
}

impl TestApp {
    fn new(seed: Vec<Clip>) -> Self {
        let clips = Arc::new(MemoryClips::default());
        *clips.clips.lock().unwrap() = seed;
        let profiles = Arc::new(MemoryProfiles::default());
        let audio = Arc::new(MemoryAudio::default());

        let config = ApiConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..ApiConfig::default()
        };
        let state = AppState::with_stores(config, clips.clone(), profiles.clone(), audio.clone());

        Self {
            router: create_router(state, None),
            clips,
            profiles,
            audio,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

fn token(sub: &str, is_anonymous: bool) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: None,
        is_anonymous,
        exp: Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn clip(id: &str, lat: f64, lng: f64, radius: f64, likes: u32, age_days: i64) -> Clip {
    Clip {
        id: ClipId::from(id),
        title: format!("Clip {}", id),
        url: format!("https://storage.example.org/audio-clips/{}.webm", id),
        lat,
        lng,
        radius,
        like_count: likes,
        dislike_count: 0,
        owner: None,
        created_at: Some(Utc::now() - Duration::days(age_days)),
    }
}

/// Clips around Alexanderplatz plus one in Kreuzberg.
fn berlin() -> Vec<Clip> {
    vec![
        clip("fresh", 52.5219, 13.4132, 200.0, 0, 0),
        clip("popular", 52.5219, 13.4132, 200.0, 10, 0),
        clip("old", 52.5219, 13.4132, 200.0, 0, 60),
        clip("kreuzberg", 52.4986, 13.4030, 200.0, 50, 0),
    ]
}

const NEARBY_URI: &str = "/api/clips/nearby?lat=52.5219&lng=13.4132";

fn ids(body: &Value) -> Vec<String> {
    body["clips"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(vec![]);
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["backend"]["status"], "ok");
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = TestApp::new(vec![]);
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_nearby_ranks_in_range_clips() {
    let app = TestApp::new(berlin());
    let (status, body) = app.get(NEARBY_URI, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["popular", "fresh", "old"]);
    assert_eq!(body["count"], 3);
    assert_eq!(body["stale"], false);
    assert!(body["clips"][0]["distance_m"].as_f64().unwrap() < 1.0);
}

#[tokio::test]
async fn test_nearby_excludes_callers_dislikes() {
    let app = TestApp::new(berlin());
    let alice = token("alice", false);

    let (status, _) = app
        .send_json(Method::POST, "/api/clips/popular/dislike", Some(&alice), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(NEARBY_URI, Some(&alice)).await;
    assert_eq!(ids(&body), vec!["fresh", "old"]);

    // Other listeners still hear it
    let (_, body) = app.get(NEARBY_URI, Some(&token("bob", true))).await;
    assert_eq!(ids(&body), vec!["popular", "fresh", "old"]);
}

#[tokio::test]
async fn test_nearby_rejects_bad_input() {
    let app = TestApp::new(berlin());

    let (status, body) = app
        .get("/api/clips/nearby?lat=52.52&lng=13.40&max_distance=-5", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = app.get("/api/clips/nearby?lat=120&lng=13.40", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .get(NEARBY_URI, Some("definitely-not-a-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_nearby_serves_stale_snapshot_when_backend_fails() {
    let app = TestApp::new(berlin());
    app.get(NEARBY_URI, None).await;

    app.clips.down.store(true, Ordering::SeqCst);
    let (status, body) = app.get(NEARBY_URI, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stale"], true);
    assert_eq!(ids(&body), vec!["popular", "fresh", "old"]);
}

#[tokio::test]
async fn test_backend_failure_without_snapshot_is_bad_gateway() {
    let app = TestApp::new(berlin());
    app.clips.down.store(true, Ordering::SeqCst);
    let (status, body) = app.get("/api/clips", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "backend_error");
}

#[tokio::test]
async fn test_list_clips_newest_first_with_limit() {
    let app = TestApp::new(berlin());
    let (status, body) = app.get("/api/clips?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let listed = ids(&body);
    assert!(!listed.contains(&"old".to_string()));
}

#[tokio::test]
async fn test_create_clip_requires_auth() {
    let app = TestApp::new(vec![]);
    let request = json!({
        "title": "Spree at night",
        "url": "https://storage.example.org/audio-clips/u/1.webm",
        "lat": 52.5170,
        "lng": 13.3889,
        "radius": 150.0
    });

    let (status, body) = app
        .send_json(Method::POST, "/api/clips", None, request.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, body) = app
        .send_json(Method::POST, "/api/clips", Some(&token("alice", false)), request)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["owner"], "alice");
    assert_eq!(body["like_count"], 0);
    assert_eq!(app.clips.clips.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_clip_validates_url() {
    let app = TestApp::new(vec![]);
    let request = json!({
        "title": "Bad link",
        "url": "ftp://example.org/clip.webm",
        "lat": 52.5170,
        "lng": 13.3889
    });
    let (status, body) = app
        .send_json(Method::POST, "/api/clips", Some(&token("alice", false)), request)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_like_counts_once_per_listener() {
    let app = TestApp::new(berlin());
    let alice = token("alice", false);

    let (status, body) = app
        .send_json(Method::POST, "/api/clips/fresh/like", Some(&alice), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["preference"], "like");

    let (_, body) = app
        .send_json(Method::POST, "/api/clips/fresh/like", Some(&alice), json!({}))
        .await;
    assert_eq!(body["changed"], false);

    let fresh = app.clips.find(&ClipId::from("fresh")).unwrap();
    assert_eq!(fresh.like_count, 1);

    let profile = app.profiles.profiles.lock().unwrap().get("alice").cloned().unwrap();
    assert_eq!(profile.liked_clip_ids, vec![ClipId::from("fresh")]);
}

#[tokio::test]
async fn test_failed_count_update_leaves_like_unrecorded() {
    let app = TestApp::new(berlin());
    let alice = token("alice", false);
    app.clips.fail_next_increment.store(true, Ordering::SeqCst);

    let (status, _) = app
        .send_json(Method::POST, "/api/clips/fresh/like", Some(&alice), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let profile = app.profiles.profiles.lock().unwrap()["alice"].clone();
    assert!(profile.liked_clip_ids.is_empty());

    let (status, body) = app
        .send_json(Method::POST, "/api/clips/fresh/like", Some(&alice), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(app.clips.find(&ClipId::from("fresh")).unwrap().like_count, 1);
}

#[tokio::test]
async fn test_dislike_unknown_clip_is_not_found() {
    let app = TestApp::new(berlin());
    let (status, body) = app
        .send_json(
            Method::POST,
            "/api/clips/missing/dislike",
            Some(&token("alice", false)),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_profile_created_on_first_access() {
    let app = TestApp::new(vec![]);
    let guest = token("guest-1", true);

    let (status, body) = app.get("/api/profile", Some(&guest)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "guest-1");
    assert_eq!(body["display_name"], "Anonymous");
    assert_eq!(body["is_anonymous"], true);

    let (status, body) = app
        .send_json(
            Method::PATCH,
            "/api/profile",
            Some(&guest),
            json!({ "display_name": "  Field Recorder  " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Field Recorder");
    assert_eq!(
        app.profiles.profiles.lock().unwrap()["guest-1"].display_name,
        "Field Recorder"
    );
}

#[tokio::test]
async fn test_upload_audio() {
    let app = TestApp::new(vec![]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", token("alice", false)))
        .header(header::CONTENT_TYPE, "audio/webm;codecs=opus")
        .body(Body::from(vec![0x1a, 0x45, 0xdf, 0xa3]))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let path = body["path"].as_str().unwrap();
    assert!(path.starts_with("alice/"));
    assert!(path.ends_with(".webm"));
    assert!(body["url"].as_str().unwrap().ends_with(path));
    assert_eq!(app.audio.objects.lock().unwrap()[path].len(), 4);
}

#[tokio::test]
async fn test_upload_rejects_non_audio_and_empty_bodies() {
    let app = TestApp::new(vec![]);
    let alice = token("alice", false);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.audio.objects.lock().unwrap().is_empty());
}
