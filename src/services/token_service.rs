// src/services/token_service.rs
use crate::clock::Clock;
use crate::db::{RefreshTokenStore, StoreError};
use crate::models::jwt::{
    AccessClaims, RefreshClaims, TokenPair, ACCESS_TOKEN_TYPE, REFRESH_TOKEN_TYPE,
};

use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, errors::ErrorKind, Algorithm, DecodingKey,
    EncodingKey, Header, Validation,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Messages stay generic: they name the failure class, never key material.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature verification failed")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("unexpected token type")]
    WrongType,
    #[error("token has been revoked or already used")]
    Revoked,
    #[error("failed to sign token")]
    Signing(#[source] JwtError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    enc_key: EncodingKey,
    dec_key: DecodingKey,
}

impl TokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>, clock: Arc<dyn Clock>, secret_key: &str) -> Self {
        let enc_key = EncodingKey::from_secret(secret_key.as_bytes());
        let dec_key = DecodingKey::from_secret(secret_key.as_bytes());

        Self {
            store,
            clock,
            enc_key,
            dec_key,
        }
    }

    /* ---------- PUBLIC API ---------- */

    /// Sign a fresh pair and register the refresh half as live.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: &str) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();

        let access_token = self
            .create_jwt(&AccessClaims::new(user_id, now))
            .map_err(TokenError::Signing)?;
        let refresh_token = self
            .create_jwt(&RefreshClaims::new(user_id, now))
            .map_err(TokenError::Signing)?;

        self.store.add(user_id, &refresh_token).await?;
        info!("Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Access tokens are stateless: signature, type and expiry only.
    #[instrument(skip_all)]
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = self.decode_jwt::<AccessClaims>(token)?;
        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(TokenError::WrongType);
        }
        self.check_expiry(claims.exp)?;

        Ok(claims)
    }

    /// Exchange a live refresh token for a brand-new pair.
    ///  1. Signature, type and expiry must check out
    ///  2. Token must still be in the user's live set
    ///  3. Old token is consumed before the new pair is issued
    #[instrument(skip_all)]
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify_refresh(refresh_token)?;
        self.check_expiry(claims.exp)?;

        if !self.store.take(&claims.sub, refresh_token).await? {
            warn!(user_id = %claims.sub, "Refresh token is not live");
            return Err(TokenError::Revoked);
        }

        self.issue(&claims.sub).await
    }

    /// Drop one refresh token, or every token for the user when none is given.
    #[instrument(skip(self, refresh_token))]
    pub async fn revoke(
        &self,
        user_id: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        match refresh_token {
            Some(token) => {
                self.store.take(user_id, token).await?;
            }
            None => self.store.clear(user_id).await?,
        }
        info!(all = refresh_token.is_none(), "Revoked refresh tokens");
        Ok(())
    }

    /// Owner of a signature-valid refresh token, expired or not.
    pub fn subject_of(&self, refresh_token: &str) -> Result<String, TokenError> {
        self.verify_refresh(refresh_token).map(|claims| claims.sub)
    }

    /* ---------- PRIVATE HELPERS ---------- */

    fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims = self.decode_jwt::<RefreshClaims>(token)?;
        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    // valid up to and including the exp second
    fn check_expiry(&self, exp: i64) -> Result<(), TokenError> {
        if self.clock.now().timestamp() > exp {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    fn create_jwt<T: serde::Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.enc_key)
    }

    fn decode_jwt<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        // expiry is checked against the injected clock instead
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<T>(token, &self.dec_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryRefreshTokenStore;
    use chrono::{Duration, TimeZone, Utc};

    const SECRET: &str = "test-secret";

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap(),
        ));
        let service = TokenService::new(
            Arc::new(MemoryRefreshTokenStore::default()),
            clock.clone(),
            SECRET,
        );
        (service, clock)
    }

    #[tokio::test]
    async fn rotated_token_cannot_be_reused() {
        let (tokens, _clock) = service();
        let original = tokens.issue("u1").await.unwrap();

        let rotated = tokens.rotate(&original.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, original.refresh_token);

        let err = tokens.rotate(&original.refresh_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Revoked));

        // the replacement is still good
        tokens.rotate(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn same_second_issues_yield_distinct_refresh_tokens() {
        let (tokens, _clock) = service();
        let a = tokens.issue("u1").await.unwrap();
        let b = tokens.issue("u1").await.unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);

        tokens.rotate(&a.refresh_token).await.unwrap();
        tokens.rotate(&b.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn revoking_one_token_leaves_the_others() {
        let (tokens, _clock) = service();
        let a = tokens.issue("u1").await.unwrap();
        let b = tokens.issue("u1").await.unwrap();

        tokens.revoke("u1", Some(&a.refresh_token)).await.unwrap();
        assert!(matches!(
            tokens.rotate(&a.refresh_token).await.unwrap_err(),
            TokenError::Revoked
        ));
        tokens.rotate(&b.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn revoking_without_token_clears_the_user() {
        let (tokens, _clock) = service();
        let a = tokens.issue("u1").await.unwrap();
        let b = tokens.issue("u1").await.unwrap();
        let other = tokens.issue("u2").await.unwrap();

        tokens.revoke("u1", None).await.unwrap();
        tokens.revoke("u1", None).await.unwrap();

        for token in [&a.refresh_token, &b.refresh_token] {
            assert!(matches!(
                tokens.rotate(token).await.unwrap_err(),
                TokenError::Revoked
            ));
        }
        tokens.rotate(&other.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn revoking_unknown_token_is_not_an_error() {
        let (tokens, _clock) = service();
        tokens.revoke("ghost", Some("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn access_token_expires_after_fifteen_minutes() {
        let (tokens, clock) = service();
        let pair = tokens.issue("u1").await.unwrap();

        clock.advance(Duration::minutes(15));
        let claims = tokens.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "u1");

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            tokens.verify_access(&pair.access_token).unwrap_err(),
            TokenError::Expired
        ));
    }

    #[tokio::test]
    async fn refresh_token_expires_after_seven_days() {
        let (tokens, clock) = service();
        let first = tokens.issue("u1").await.unwrap();
        let second = tokens.issue("u1").await.unwrap();

        clock.advance(Duration::days(7));
        tokens.rotate(&first.refresh_token).await.unwrap();

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            tokens.rotate(&second.refresh_token).await.unwrap_err(),
            TokenError::Expired
        ));
    }

    #[tokio::test]
    async fn token_types_are_not_interchangeable() {
        let (tokens, _clock) = service();
        let pair = tokens.issue("u1").await.unwrap();

        assert!(matches!(
            tokens.rotate(&pair.access_token).await.unwrap_err(),
            TokenError::WrongType
        ));
        assert!(matches!(
            tokens.verify_access(&pair.refresh_token).unwrap_err(),
            TokenError::WrongType
        ));
    }

    #[tokio::test]
    async fn foreign_signatures_are_rejected() {
        let (tokens, clock) = service();
        let forger = TokenService::new(
            Arc::new(MemoryRefreshTokenStore::default()),
            clock,
            "another-secret",
        );
        let forged = forger.issue("u1").await.unwrap();

        assert!(matches!(
            tokens.rotate(&forged.refresh_token).await.unwrap_err(),
            TokenError::BadSignature
        ));
        assert!(matches!(
            tokens.rotate("not-a-jwt").await.unwrap_err(),
            TokenError::Malformed
        ));
    }

    #[tokio::test]
    async fn error_messages_do_not_leak_the_secret() {
        let (tokens, _clock) = service();
        let err = tokens.rotate("garbage").await.unwrap_err();
        assert!(!err.to_string().contains(SECRET));
    }

    #[tokio::test]
    async fn concurrent_rotations_succeed_once() {
        let (tokens, _clock) = service();
        let pair = tokens.issue("u1").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { tokens.rotate(&token).await.is_ok() })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn subject_of_ignores_expiry() {
        let (tokens, clock) = service();
        let pair = tokens.issue("u1").await.unwrap();
        clock.advance(Duration::days(30));

        assert_eq!(tokens.subject_of(&pair.refresh_token).unwrap(), "u1");
    }
}
