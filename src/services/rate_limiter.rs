use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::clock::Clock;
use crate::db::{RateLimitStore, StoreError};

/// Sliding-window limiter: at most `max_requests` admissions per key within
/// any trailing `window`. Rejected attempts are not counted.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        max_requests: usize,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max_requests,
            window,
        }
    }

    #[instrument(skip(self))]
    pub async fn admit(&self, client_key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let admitted = self
            .store
            .try_record(client_key, now, self.window, self.max_requests)
            .await?;

        if admitted {
            debug!("Request admitted");
        } else {
            warn!(
                max_requests = self.max_requests,
                window_secs = self.window.num_seconds(),
                "Rate limit exceeded"
            );
        }
        Ok(admitted)
    }

    /// Forget clients whose window has emptied out.
    pub async fn prune(&self) -> Result<usize, StoreError> {
        self.store.prune(self.clock.now(), self.window).await
    }
}
