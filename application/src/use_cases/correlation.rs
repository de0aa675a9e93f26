//! Session → user correlation
//!
//! The event stream names only a session id. The owning user is whoever has
//! a session record with that id *on the instance the event came from*; a
//! session with the same id on another instance belongs to nobody here.
//!
//! Resolution is a linear scan over every persisted user record. A
//! secondary `(instance, session) -> user` index short-circuits the scan; it
//! is filled by session writes and by successful scans, and a hit is always
//! re-checked against the store before it is trusted.

use crate::ports::user_store::{StoreError, UserStateStore};
use herd_domain::{InstanceId, USER_KEY_PREFIX, UserState};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

type IndexKey = (InstanceId, String);

pub struct SessionCorrelator {
    store: Arc<dyn UserStateStore>,
    index: RwLock<HashMap<IndexKey, String>>,
}

impl SessionCorrelator {
    pub fn new(store: Arc<dyn UserStateStore>) -> Self {
        Self {
            store,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the user owning `session_id` on `instance_id`.
    pub async fn resolve(
        &self,
        session_id: &str,
        instance_id: &InstanceId,
    ) -> Result<Option<String>, StoreError> {
        if let Some(user_id) = self.cached(session_id, instance_id) {
            let key = UserState::storage_key(&user_id);
            if let Some(state) = self.store.get(&key).await?
                && state.owns(session_id, instance_id)
            {
                trace!("Correlation index hit for {}/{}", instance_id, session_id);
                return Ok(Some(user_id));
            }
            self.forget(instance_id, session_id);
        }

        let records = self.store.list_by_prefix(USER_KEY_PREFIX).await?;
        let owner = records
            .into_iter()
            .map(|(_, state)| state)
            .find(|state| state.owns(session_id, instance_id))
            .map(|state| state.user_id);

        if let Some(user_id) = &owner {
            self.remember(instance_id, session_id, user_id);
        }
        Ok(owner)
    }

    pub fn remember(&self, instance_id: &InstanceId, session_id: &str, user_id: &str) {
        let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
        index.insert(
            (instance_id.clone(), session_id.to_string()),
            user_id.to_string(),
        );
    }

    pub fn forget(&self, instance_id: &InstanceId, session_id: &str) {
        let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
        index.remove(&(instance_id.clone(), session_id.to_string()));
    }

    fn cached(&self, session_id: &str, instance_id: &InstanceId) -> Option<String> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        index
            .get(&(instance_id.clone(), session_id.to_string()))
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn indexed(&self) -> usize {
        self.index.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
