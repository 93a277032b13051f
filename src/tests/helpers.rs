use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::clock::ManualClock;
use crate::config::Config;
use crate::db::{MemoryIdentityStore, MemoryRateLimitStore, MemoryRefreshTokenStore, Stores};
use crate::models::landmarks::{Hand, Landmark};
use crate::services::detector::{DetectError, LandmarkDetector};
use crate::{create_router, AppState};

static INIT: Once = Once::new();

/// Image bytes the static detector finds no hand in.
pub const NO_HAND_IMAGE: &[u8] = b"empty-room";
/// Image bytes the static detector refuses to decode.
pub const CORRUPT_IMAGE: &[u8] = b"corrupt";
/// Image bytes that make the static detector behave as if it were down.
pub const UNAVAILABLE_IMAGE: &[u8] = b"sidecar-down";

/// Initialize logging exactly once
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_max_level(Level::ERROR)
            .with_span_events(FmtSpan::NONE)
            .init();
    });
}

/// Stands in for the inference sidecar: one 21-point hand for any image
/// except the sentinel payloads above.
pub struct StaticDetector;

#[async_trait]
impl LandmarkDetector for StaticDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Hand>, DetectError> {
        match image {
            NO_HAND_IMAGE => Ok(vec![]),
            CORRUPT_IMAGE => Err(DetectError::Decode("not an image".into())),
            UNAVAILABLE_IMAGE => Err(DetectError::Unavailable("connection refused".into())),
            _ => Ok(vec![sample_hand()]),
        }
    }
}

pub fn sample_hand() -> Hand {
    let landmarks = (0..21)
        .map(|i| {
            let i = i as f32;
            Landmark {
                x: 0.3 + i * 0.01,
                y: 0.6 - i * 0.015,
                z: -0.002 * i,
            }
        })
        .collect();
    Hand::new(landmarks)
}

pub fn image_payload(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub identities: Arc<MemoryIdentityStore>,
}

pub fn test_config() -> Config {
    Config {
        secret_key: "test-secret-key".into(),
        fingerprint_hash_cost: 4,
        ..Config::default()
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config())
}

pub fn create_test_app_with(config: Config) -> TestApp {
    init_tracing();
    info!("Creating test application");

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
    ));
    let identities = Arc::new(MemoryIdentityStore::default());
    let stores = Stores {
        rate_limits: Arc::new(MemoryRateLimitStore::default()),
        identities: identities.clone(),
        refresh_tokens: Arc::new(MemoryRefreshTokenStore::default()),
    };

    let state = AppState::new(config, stores, Arc::new(StaticDetector), clock.clone());
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        clock,
        identities,
    }
}

pub const DEFAULT_CLIENT: &str = "1.2.3.4";

pub async fn test_request(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: Option<HeaderMap>,
) -> (StatusCode, Value) {
    test_request_from(app, DEFAULT_CLIENT, method, uri, body, headers).await
}

pub async fn test_request_from(
    app: &TestApp,
    client_ip: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: Option<HeaderMap>,
) -> (StatusCode, Value) {
    info!(method = %method, uri = %uri, "Making test request");

    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(custom_headers) = headers {
        for (key, value) in custom_headers.iter() {
            request = request.header(key, value);
        }
    }

    let mut request = request.body(body).unwrap();
    let peer: SocketAddr = format!("{}:40000", client_ip).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    info!(status = %status, body = %json, "Test response received");
    (status, json)
}
