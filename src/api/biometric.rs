use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::services::auth_service::Session;
use crate::utils::client_addr::ClientKey;
use crate::utils::image::decode_image_payload;
use crate::AppState;

const DEFAULT_SCAN_TYPE: &str = "palm-vein";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    image_data: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    image_data: Option<String>,
    user_id: Option<String>,
    scan_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    user_id: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    success: bool,
    user_id: String,
    message: String,
    token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    success: bool,
    token: String,
    refresh_token: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    success: bool,
    message: String,
}

impl SessionResponse {
    fn new(session: Session, message: &str) -> Self {
        Self {
            success: true,
            user_id: session.user_id,
            message: message.to_string(),
            token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        }
    }
}

/// Treat `""` the same as an absent field.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| AppError::bad_request("Invalid request body"))
}

async fn admit(state: &AppState, client: &ClientKey) -> AppResult<()> {
    if state.rate_limiter.admit(&client.0).await? {
        Ok(())
    } else {
        Err(AppError::RateLimited)
    }
}

/// `POST /api/biometric/register`
#[instrument(skip_all, fields(client = %client.0))]
pub async fn register(
    State(state): State<AppState>,
    client: ClientKey,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<SessionResponse>> {
    admit(&state, &client).await?;
    let request = body(payload)?;

    let image_data = present(request.image_data)
        .ok_or_else(|| AppError::bad_request("No image data provided"))?;
    let image = decode_image_payload(&image_data)
        .map_err(|_| AppError::bad_request("Invalid image data"))?;

    let session = state.auth.register(&image, present(request.user_id)).await?;
    info!(user_id = %session.user_id, "Biometric data registered");

    Ok(Json(SessionResponse::new(
        session,
        "Biometric data registered successfully",
    )))
}

/// `POST /api/biometric/authenticate`
#[instrument(skip_all, fields(client = %client.0))]
pub async fn authenticate(
    State(state): State<AppState>,
    client: ClientKey,
    payload: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> AppResult<Json<SessionResponse>> {
    admit(&state, &client).await?;
    let request = body(payload)?;

    let image = present(request.image_data)
        .map(|data| decode_image_payload(&data))
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid image data"))?;
    let scan_type = present(request.scan_type).unwrap_or_else(|| DEFAULT_SCAN_TYPE.to_string());

    let session = state
        .auth
        .authenticate(image.as_deref(), present(request.user_id), &scan_type)
        .await?;

    let message = if session.simulated {
        "Authentication successful (simulated)"
    } else {
        "Authentication successful"
    };
    Ok(Json(SessionResponse::new(session, message)))
}

/// `POST /api/biometric/refresh-token`
#[instrument(skip_all, fields(client = %client.0))]
pub async fn refresh_token(
    State(state): State<AppState>,
    client: ClientKey,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<RefreshResponse>> {
    admit(&state, &client).await?;
    let request = body(payload)?;

    let refresh_token = present(request.refresh_token)
        .ok_or_else(|| AppError::bad_request("Refresh token is required"))?;
    let tokens = state.auth.refresh(&refresh_token).await?;

    Ok(Json(RefreshResponse {
        success: true,
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// `POST /api/biometric/logout`. Never fails and is not rate limited.
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Json<LogoutResponse> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();

    state
        .auth
        .logout(present(request.user_id), present(request.refresh_token))
        .await;

    Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}
