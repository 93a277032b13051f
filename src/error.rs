use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;
use crate::services::biometric_service::ScanError;
use crate::services::detector::DetectError;
use crate::services::token_service::TokenError;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a handler can report. Rendered as
/// `{"success": false, "message": ...}` with the matching status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("Server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!(error = %detail, "Request failed");
        }

        let body = Json(ErrorBody {
            success: false,
            message: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Internal(e.to_string()),
            TokenError::Store(e) => AppError::from(e),
            other => AppError::InvalidToken(format!("Invalid refresh token: {}", other)),
        }
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NoHand => AppError::bad_request(ScanError::NoHand.to_string()),
            ScanError::Detect(DetectError::Decode(_)) => {
                AppError::bad_request("Image could not be decoded")
            }
            ScanError::Detect(e @ DetectError::Unavailable(_)) => AppError::Internal(e.to_string()),
            ScanError::Hash(detail) => AppError::Internal(detail),
        }
    }
}
