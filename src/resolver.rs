//! Resolver - Maps an aggregate's namespace to its outbox store.
//!
//! The namespace key is the underscored path enclosing the aggregate type:
//! `Billing::Accounts::Invoice` is looked up as `"billing/accounts"`, then as
//! `"default"`. Top-level types go straight to `"default"`.
//!
//! ```
//! use std::sync::Arc;
//! use transactional_outbox::{Configuration, OutboxModel, OutboxResolver, StoreRegistry};
//!
//! let stores = Arc::new(
//!     StoreRegistry::new()
//!         .with(OutboxModel::new("Outbox", "outboxes"))
//!         .with(OutboxModel::new("Uuid::Outbox", "uuid_outboxes")),
//! );
//! let config = Configuration::new()
//!     .map("default", "Outbox")
//!     .map("uuid", "Uuid::Outbox");
//! let resolver = OutboxResolver::new(config, stores);
//!
//! assert_eq!(resolver.resolve("Uuid::FakeModel")?.table(), "uuid_outboxes");
//! assert_eq!(resolver.resolve("FakeModel")?.table(), "outboxes");
//! # Ok::<(), transactional_outbox::ConfigurationError>(())
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::{Configuration, DEFAULT_KEY};
use crate::error::ConfigurationError;
use crate::inflector::namespace_of;
use crate::outbox::{OutboxStore, StoreRegistry};

/// Resolves and memoizes outbox stores per namespace.
///
/// A namespace is resolved at most once per resolver; the handle is then
/// reused for every aggregate in that namespace. Concurrent first lookups
/// agree on one handle: the first one cached wins. Store code never runs
/// under the cache lock, so a poisoned cache is still consistent.
pub struct OutboxResolver {
    config: Configuration,
    stores: Arc<StoreRegistry>,
    /// Keyed by namespace; `None` is the top level.
    resolved: RwLock<HashMap<Option<String>, Arc<dyn OutboxStore>>>,
}

impl OutboxResolver {
    pub fn new(config: Configuration, stores: Arc<StoreRegistry>) -> Self {
        Self {
            config,
            stores,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn stores(&self) -> &Arc<StoreRegistry> {
        &self.stores
    }

    /// Outbox store for the aggregate type `type_name`.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<dyn OutboxStore>, ConfigurationError> {
        let namespace = namespace_of(type_name);

        if let Some(store) = self.cached(namespace.as_deref()) {
            return Ok(store);
        }

        let store = self.lookup(namespace.as_deref())?;

        let store = {
            let mut resolved = self
                .resolved
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(resolved.entry(namespace.clone()).or_insert(store))
        };
        debug!(
            namespace = namespace.as_deref().unwrap_or("<root>"),
            store = store.name(),
            "resolved outbox store"
        );
        Ok(store)
    }

    /// Handle memoized for `namespace`, if it has been resolved.
    pub fn cached(&self, namespace: Option<&str>) -> Option<Arc<dyn OutboxStore>> {
        let key = namespace.map(str::to_string);
        self.resolved
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
    }

    fn lookup(&self, namespace: Option<&str>) -> Result<Arc<dyn OutboxStore>, ConfigurationError> {
        let name = namespace
            .and_then(|namespace| self.config.outbox_for(namespace))
            .or_else(|| self.config.outbox_for(DEFAULT_KEY))
            .ok_or_else(|| ConfigurationError::OutboxClassNotFound {
                namespace: namespace.map(str::to_string),
                store: None,
            })?;

        self.stores
            .get(name)
            .ok_or_else(|| ConfigurationError::OutboxClassNotFound {
                namespace: namespace.map(str::to_string),
                store: Some(name.to_string()),
            })
    }
}
