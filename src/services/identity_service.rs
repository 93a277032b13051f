use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::{IdentityStore, StoreError};
use crate::models::user::UserRecord;

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn new_user_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Store `fingerprint` for `user_id`, replacing any previous record.
    #[instrument(skip(self, fingerprint))]
    pub async fn enroll(
        &self,
        user_id: &str,
        fingerprint: String,
    ) -> Result<UserRecord, StoreError> {
        let record = UserRecord::new(fingerprint, self.clock.now());
        self.store.put(user_id, record.clone()).await?;
        info!("Enrolled user");
        Ok(record)
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.store.get(user_id).await
    }
}
