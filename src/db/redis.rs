use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{IdentityStore, RateLimitStore, RefreshTokenStore, StoreError};
use crate::models::jwt::refresh_token_ttl;
use crate::models::user::UserRecord;

// KEYS[1] window key, ARGV: cutoff ms, now ms, max requests, member, window ms
const ADMIT_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
if redis.call('ZCARD', KEYS[1]) >= tonumber(ARGV[3]) then
    return 0
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[4])
redis.call('PEXPIRE', KEYS[1], ARGV[5])
return 1
"#;

/// Redis-backed stores, shared between gateway instances.
///
/// ```text
/// ratelimit:{client}      sorted set of request times (ms), expires with the window
/// user:{user_id}          UserRecord JSON
/// refresh_tokens:{user}   set of live refresh tokens, expires with the newest token
/// ```
#[derive(Clone)]
pub struct RedisStore {
    con: ConnectionManager,
}

impl RedisStore {
    #[instrument(skip(redis_url))]
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!("Initializing Redis connection");

        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to create Redis client");
                return Err(e.into());
            }
        };

        match ConnectionManager::new(client).await {
            Ok(con) => {
                info!("Redis connection established");
                Ok(Self { con })
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis");
                Err(e.into())
            }
        }
    }
}

fn window_key(client: &str) -> String {
    format!("ratelimit:{}", client)
}

fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

fn refresh_key(user_id: &str) -> String {
    format!("refresh_tokens:{}", user_id)
}

#[async_trait]
impl RateLimitStore for RedisStore {
    #[instrument(skip(self))]
    async fn try_record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_requests: usize,
    ) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let now_ms = now.timestamp_millis();
        let cutoff_ms = (now - window).timestamp_millis();
        let member = format!("{}-{}", now_ms, Uuid::new_v4());

        let script = Script::new(ADMIT_SCRIPT);
        let admitted: i64 = script
            .key(window_key(key))
            .arg(cutoff_ms)
            .arg(now_ms)
            .arg(max_requests)
            .arg(member)
            .arg(window.num_milliseconds())
            .invoke_async(&mut con)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to run rate limit script");
                e
            })?;

        Ok(admitted == 1)
    }

    async fn prune(&self, _now: DateTime<Utc>, _window: Duration) -> Result<usize, StoreError> {
        // windows carry their own PEXPIRE
        Ok(0)
    }
}

#[async_trait]
impl IdentityStore for RedisStore {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut con = self.con.clone();
        let raw: Option<String> = con.get(user_key(user_id)).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => {
                debug!("User record not found in Redis");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, record))]
    async fn put(&self, user_id: &str, record: UserRecord) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        let json = serde_json::to_string(&record)?;
        if let Err(e) = con.set::<_, _, ()>(user_key(user_id), json).await {
            error!(error = %e, "Failed to store user record in Redis");
            return Err(e.into());
        }

        info!("Stored user record");
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for RedisStore {
    #[instrument(skip(self, token))]
    async fn add(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        let key = refresh_key(user_id);

        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(&key)
            .arg(token)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(refresh_token_ttl().num_seconds())
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to store refresh token in Redis");
                StoreError::from(e)
            })
    }

    #[instrument(skip(self, token))]
    async fn take(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let removed: i64 = con.srem(refresh_key(user_id), token).await?;
        if removed == 0 {
            warn!("Refresh token not found in Redis");
        }
        Ok(removed == 1)
    }

    #[instrument(skip(self))]
    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        if let Err(e) = con.del::<_, ()>(refresh_key(user_id)).await {
            error!(error = %e, "Failed to remove refresh tokens");
            return Err(e.into());
        }

        info!("Invalidated all refresh tokens for user");
        Ok(())
    }
}
