use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    success: bool,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

/// `GET /api/biometric/me`, behind the bearer-token middleware.
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let record = state.identities.find(&user_id).await?;

    Ok(Json(UserResponse {
        success: true,
        user_id,
        created_at: record.map(|r| r.created_at),
    }))
}
