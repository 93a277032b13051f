use tracing::{error, info, instrument, warn};

use crate::error::AppError;
use crate::models::jwt::TokenPair;
use crate::models::user::SIMULATED_FINGERPRINT;
use crate::services::biometric_service::BiometricService;
use crate::services::identity_service::IdentityService;
use crate::services::token_service::TokenService;

/// A user id together with the tokens just issued for it.
#[derive(Debug)]
pub struct Session {
    pub user_id: String,
    pub tokens: TokenPair,
    pub simulated: bool,
}

/// Composes scanning, enrollment and token issuance into the login flows.
#[derive(Clone)]
pub struct AuthService {
    biometrics: BiometricService,
    identities: IdentityService,
    tokens: TokenService,
    simulated_auth: bool,
}

impl AuthService {
    pub fn new(
        biometrics: BiometricService,
        identities: IdentityService,
        tokens: TokenService,
        simulated_auth: bool,
    ) -> Self {
        Self {
            biometrics,
            identities,
            tokens,
            simulated_auth,
        }
    }

    /// Enroll (or re-enroll) a user from a scan. Nothing is stored unless a
    /// hand is detected.
    #[instrument(skip(self, image))]
    pub async fn register(
        &self,
        image: &[u8],
        user_id: Option<String>,
    ) -> Result<Session, AppError> {
        let fingerprint = self.biometrics.scan(image).await?;

        let user_id = user_id.unwrap_or_else(IdentityService::new_user_id);
        self.identities.enroll(&user_id, fingerprint).await?;
        let tokens = self.tokens.issue(&user_id).await?;

        Ok(Session {
            user_id,
            tokens,
            simulated: false,
        })
    }

    /// Detection-only login: any detected hand is accepted for a known user,
    /// and an unknown or missing user id gets a fresh identity. The derived
    /// fingerprint is never compared against the stored one.
    #[instrument(skip(self, image))]
    pub async fn authenticate(
        &self,
        image: Option<&[u8]>,
        user_id: Option<String>,
        scan_type: &str,
    ) -> Result<Session, AppError> {
        let Some(image) = image else {
            return self.authenticate_simulated(user_id).await;
        };

        let fingerprint = self.biometrics.scan(image).await?;

        let known = match user_id {
            Some(id) => self.identities.find(&id).await?.map(|_| id),
            None => None,
        };
        let user_id = match known {
            Some(id) => id,
            None => {
                let id = IdentityService::new_user_id();
                self.identities.enroll(&id, fingerprint).await?;
                id
            }
        };

        let tokens = self.tokens.issue(&user_id).await?;
        info!(%user_id, "Authentication successful");

        Ok(Session {
            user_id,
            tokens,
            simulated: false,
        })
    }

    async fn authenticate_simulated(&self, user_id: Option<String>) -> Result<Session, AppError> {
        if !self.simulated_auth {
            return Err(AppError::bad_request("No image data provided"));
        }

        let user_id = match user_id {
            Some(id) => id,
            None => {
                let id = IdentityService::new_user_id();
                self.identities
                    .enroll(&id, SIMULATED_FINGERPRINT.to_string())
                    .await?;
                id
            }
        };

        let tokens = self.tokens.issue(&user_id).await?;
        warn!(%user_id, "Simulated authentication, no image was scanned");

        Ok(Session {
            user_id,
            tokens,
            simulated: true,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        Ok(self.tokens.rotate(refresh_token).await?)
    }

    /// Best effort: unknown users, bad tokens and store failures are all a no-op.
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(&self, user_id: Option<String>, refresh_token: Option<String>) {
        let user_id = user_id.or_else(|| {
            refresh_token
                .as_deref()
                .and_then(|token| self.tokens.subject_of(token).ok())
        });
        let Some(user_id) = user_id else {
            return;
        };

        if let Err(e) = self.tokens.revoke(&user_id, refresh_token.as_deref()).await {
            error!(error = %e, "Failed to revoke refresh tokens during logout");
        }
    }
}
