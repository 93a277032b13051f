//! Landmark detection and fingerprint derivation.
//!
//! Fingerprints are salted on every derivation, so two scans of the same hand
//! never produce the same value. They are stored but never compared: the
//! gateway runs in detection-only mode, with no verification.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

use crate::models::landmarks::Hand;
use crate::services::detector::{DetectError, LandmarkDetector};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("No hand detected in the image")]
    NoHand,
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("fingerprint hashing failed: {0}")]
    Hash(String),
}

/// Every landmark of every hand as `x y z` with four decimals, no separators.
pub fn landmark_digest(hands: &[Hand]) -> String {
    hands
        .iter()
        .flat_map(|hand| hand.landmarks.iter())
        .map(|point| format!("{:.4}{:.4}{:.4}", point.x, point.y, point.z))
        .collect()
}

/// bcrypt reads at most 72 bytes, so the digest is condensed with SHA-256 first.
pub fn derive_fingerprint(hands: &[Hand], cost: u32) -> Result<String, bcrypt::BcryptError> {
    let condensed = hex_sha256(landmark_digest(hands).as_bytes());
    bcrypt::hash(condensed, cost)
}

fn hex_sha256(input: &[u8]) -> String {
    Sha256::digest(input)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[derive(Clone)]
pub struct BiometricService {
    detector: Arc<dyn LandmarkDetector>,
    hash_cost: u32,
}

impl BiometricService {
    pub fn new(detector: Arc<dyn LandmarkDetector>, hash_cost: u32) -> Self {
        Self {
            detector,
            hash_cost,
        }
    }

    /// Detect hands in `image` and derive a fresh fingerprint from them.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn scan(&self, image: &[u8]) -> Result<String, ScanError> {
        let hands = self.detector.detect(image).await?;
        if hands.is_empty() {
            return Err(ScanError::NoHand);
        }
        info!(hands = hands.len(), "Hand detected");

        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || derive_fingerprint(&hands, cost))
            .await
            .map_err(|e| ScanError::Hash(e.to_string()))?
            .map_err(|e| ScanError::Hash(e.to_string()))
    }
}
