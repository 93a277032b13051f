// src/models/jwt.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

pub fn access_token_ttl() -> Duration {
    Duration::minutes(15)
}

pub fn refresh_token_ttl() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,        // user id
    pub exp: i64,           // expiration time
    pub iat: i64,           // issued at
    #[serde(rename = "type")]
    pub token_type: String, // "access"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,        // user id
    pub exp: i64,           // expiration time
    pub iat: i64,           // issued at
    #[serde(default)]
    pub jti: String,        // keeps same-second tokens distinct
    #[serde(rename = "type")]
    pub token_type: String, // "refresh"
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl AccessClaims {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        let expires_at = now + access_token_ttl();

        Self {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        }
    }
}

impl RefreshClaims {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        let expires_at = now + refresh_token_ttl();

        Self {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
        }
    }
}
