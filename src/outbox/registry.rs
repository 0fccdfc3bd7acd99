use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::OutboxStore;

/// Registry of outbox stores by name.
///
/// Configuration refers to stores by name (`"Uuid::Outbox"`); the registry
/// turns those names into live handles. Populate it at startup. Store code
/// never runs under the lock, so a poisoned map is still consistent.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn OutboxStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](StoreRegistry::register).
    pub fn with<S: OutboxStore + 'static>(self, store: S) -> Self {
        self.register(store);
        self
    }

    /// Register a store under its own name, replacing any previous store
    /// with that name.
    pub fn register<S: OutboxStore + 'static>(&self, store: S) -> Arc<dyn OutboxStore> {
        self.register_shared(Arc::new(store))
    }

    pub fn register_shared(&self, store: Arc<dyn OutboxStore>) -> Arc<dyn OutboxStore> {
        let name = normalize_name(store.name());
        self.stores
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, Arc::clone(&store));
        store
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OutboxStore>> {
        self.stores
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&normalize_name(name))
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_start_matches("::").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::OutboxModel;

    #[test]
    fn looks_up_registered_stores() {
        let registry = StoreRegistry::new()
            .with(OutboxModel::new("Outbox", "outboxes"))
            .with(OutboxModel::new("Uuid::Outbox", "uuid_outboxes"));

        assert_eq!(registry.get("Uuid::Outbox").unwrap().table(), "uuid_outboxes");
        assert_eq!(registry.get("::Outbox").unwrap().table(), "outboxes");
        assert!(registry.get("Missing::Outbox").is_none());
        assert_eq!(registry.names(), vec!["Outbox".to_string(), "Uuid::Outbox".to_string()]);
    }

    #[test]
    fn lookups_share_the_registered_handle() {
        let registry = StoreRegistry::new();
        let registered = registry.register(OutboxModel::new("Outbox", "outboxes"));
        let found = registry.get("Outbox").unwrap();
        assert!(Arc::ptr_eq(&registered, &found));
    }
}
