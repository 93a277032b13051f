use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, AppState};

/// The subject of a valid access token, set by [`auth_middleware`].
#[derive(Clone)]
pub struct CurrentUser(pub String);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Get the authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::InvalidToken("Missing access token".into()))?;

    // Extract the bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::InvalidToken("Missing access token".into()))?;

    let claims = state
        .tokens
        .verify_access(token)
        .map_err(|e| AppError::InvalidToken(format!("Invalid access token: {}", e)))?;

    request.extensions_mut().insert(CurrentUser(claims.sub));

    Ok(next.run(request).await)
}
