//! Instance registry
//!
//! The in-memory map from instance id to a live client handle, and the sole
//! source of truth for "is this instance known". Owned by the composition
//! root and shared by `Arc`; stream callbacks read it concurrently.

use crate::ports::backend::BackendClient;
use herd_domain::{Instance, InstanceId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// An instance together with the client bound to it.
#[derive(Clone)]
pub struct RegisteredInstance {
    pub instance: Instance,
    pub client: Arc<dyn BackendClient>,
}

impl std::fmt::Debug for RegisteredInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredInstance")
            .field("instance", &self.instance)
            .field("base_url", &self.client.base_url())
            .finish()
    }
}

#[derive(Default)]
pub struct InstanceRegistry {
    entries: RwLock<HashMap<InstanceId, RegisteredInstance>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an instance unless its id is already taken.
    ///
    /// Returns the entry that is registered afterwards, and whether it is
    /// the one just supplied. An existing entry is never replaced.
    pub fn register(
        &self,
        instance: Instance,
        client: Arc<dyn BackendClient>,
    ) -> (RegisteredInstance, bool) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(&instance.id) {
            return (existing.clone(), false);
        }

        info!(
            "Registered instance {} ({}) at {} for {}",
            instance.id,
            instance.origin,
            instance.base_url,
            instance.working_directory.display()
        );
        let entry = RegisteredInstance { instance, client };
        entries.insert(entry.instance.id.clone(), entry.clone());
        (entry, true)
    }

    pub fn get(&self, id: &InstanceId) -> Option<RegisteredInstance> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    pub fn client(&self, id: &InstanceId) -> Option<Arc<dyn BackendClient>> {
        self.get(id).map(|entry| entry.client)
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(id)
    }

    /// The registered instance serving `directory`, if any.
    pub fn find_by_directory(&self, directory: &Path) -> Option<RegisteredInstance> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .find(|entry| entry.instance.working_directory == directory)
            .cloned()
    }

    pub fn unregister(&self, id: &InstanceId) -> Option<RegisteredInstance> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let removed = entries.remove(id);
        if removed.is_some() {
            info!("Unregistered instance {}", id);
        }
        removed
    }

    /// Snapshot of every registered instance, ordered by id.
    pub fn instances(&self) -> Vec<Instance> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut instances: Vec<Instance> =
            entries.values().map(|entry| entry.instance.clone()).collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        instances
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
