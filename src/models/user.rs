use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fingerprint stored in place of a real scan on the simulated login path.
pub const SIMULATED_FINGERPRINT: &str = "simulated-hash";

/// What the gateway remembers about a user. Never the raw landmarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(fingerprint: String, created_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            created_at,
        }
    }
}
