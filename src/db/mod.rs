use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::models::user::UserRecord;

pub mod memory;
pub mod redis;

pub use self::memory::{MemoryIdentityStore, MemoryRateLimitStore, MemoryRefreshTokenStore};
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sliding-window request log per client key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Drop timestamps at or before `now - window`, then record `now` unless
    /// `max_requests` remain. Returns whether `now` was recorded.
    /// Check and record happen atomically for a given key.
    async fn try_record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_requests: usize,
    ) -> Result<bool, StoreError>;

    /// Remove windows that hold no timestamp newer than `now - window`.
    /// Returns how many were removed.
    async fn prune(&self, now: DateTime<Utc>, window: Duration) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Last write wins.
    async fn put(&self, user_id: &str, record: UserRecord) -> Result<(), StoreError>;
}

/// The set of live refresh tokens for each user.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn add(&self, user_id: &str, token: &str) -> Result<(), StoreError>;

    /// Remove `token` and report whether it was present.
    /// Concurrent calls for the same token see `true` at most once.
    async fn take(&self, user_id: &str, token: &str) -> Result<bool, StoreError>;

    async fn clear(&self, user_id: &str) -> Result<(), StoreError>;
}

/// The three stores the gateway shares across requests.
#[derive(Clone)]
pub struct Stores {
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            rate_limits: Arc::new(MemoryRateLimitStore::default()),
            identities: Arc::new(MemoryIdentityStore::default()),
            refresh_tokens: Arc::new(MemoryRefreshTokenStore::default()),
        }
    }

    pub fn redis(store: RedisStore) -> Self {
        Self {
            rate_limits: Arc::new(store.clone()),
            identities: Arc::new(store.clone()),
            refresh_tokens: Arc::new(store),
        }
    }
}

/// Redis when a URL is configured, process memory otherwise.
pub async fn create_stores(redis_url: Option<&str>) -> Result<Stores, StoreError> {
    match redis_url {
        Some(url) => Ok(Stores::redis(RedisStore::connect(url).await?)),
        None => {
            tracing::info!("No REDIS_URL configured, state is kept in process memory");
            Ok(Stores::in_memory())
        }
    }
}
