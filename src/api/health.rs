use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

pub const SERVICE_NAME: &str = "palm-vein-authentication";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: f64,
}

/// `GET /api/biometric/health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = state.clock.now();
    Json(HealthResponse {
        status: "online",
        service: SERVICE_NAME,
        timestamp: now.timestamp_millis() as f64 / 1000.0,
    })
}
