//! User state persistence port
//!
//! The store is an opaque key-value collaborator. Records live under
//! `user:<id>` keys; see [`UserState::storage_key`].

use async_trait::async_trait;
use herd_domain::UserState;
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store backend failed: {0}")]
    Backend(String),

    #[error("Corrupt record under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Get/set/delete/list-by-prefix over string keys holding user records.
///
/// Concurrent read-modify-write is not transactional; a lost update on
/// `last_accessed` or the session list is tolerated.
#[async_trait]
pub trait UserStateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UserState>, StoreError>;

    async fn set(&self, key: &str, state: &UserState) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All records whose key starts with `prefix`, with their keys.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, UserState)>, StoreError>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryUserStore {
    records: RwLock<BTreeMap<String, UserState>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStateStore for MemoryUserStore {
    async fn get(&self, key: &str) -> Result<Option<UserState>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(key).cloned())
    }

    async fn set(&self, key: &str, state: &UserState) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(key.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(key);
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, UserState)>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect())
    }
}
