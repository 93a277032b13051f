use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};

use super::{IdentityStore, RateLimitStore, RefreshTokenStore, StoreError};
use crate::models::user::UserRecord;

/// Purge then admit against one window. Timestamps are kept in arrival order.
pub(crate) fn admit_window(
    window: &mut VecDeque<DateTime<Utc>>,
    now: DateTime<Utc>,
    length: Duration,
    max_requests: usize,
) -> bool {
    let cutoff = now - length;
    while window.front().is_some_and(|ts| *ts <= cutoff) {
        window.pop_front();
    }

    if window.len() >= max_requests {
        return false;
    }

    window.push_back(now);
    true
}

#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
}

#[cfg(test)]
impl MemoryRateLimitStore {
    pub fn len(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn try_record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_requests: usize,
    ) -> Result<bool, StoreError> {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        Ok(admit_window(entry.value_mut(), now, window, max_requests))
    }

    async fn prune(&self, now: DateTime<Utc>, window: Duration) -> Result<usize, StoreError> {
        let cutoff = now - window;
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|ts| *ts > cutoff);
            !timestamps.is_empty()
        });
        Ok(before.saturating_sub(self.windows.len()))
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, UserRecord>,
}

#[cfg(test)]
impl MemoryIdentityStore {
    pub fn len(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(user_id).map(|record| record.value().clone()))
    }

    async fn put(&self, user_id: &str, record: UserRecord) -> Result<(), StoreError> {
        self.users.insert(user_id.to_string(), record);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<String, HashSet<String>>,
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn add(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        self.tokens
            .entry(user_id.to_string())
            .or_default()
            .insert(token.to_string());
        Ok(())
    }

    async fn take(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .tokens
            .get_mut(user_id)
            .is_some_and(|mut set| set.remove(token)))
    }

    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        self.tokens.remove(user_id);
        Ok(())
    }
}
