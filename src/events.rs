//! Event names - `<TYPE>_<ACTION>[.<namespace>]` identifiers per aggregate type.
//!
//! ```
//! use transactional_outbox::{Action, EventNameRegistry};
//!
//! let names = EventNameRegistry::new();
//! assert_eq!(&*names.derive("Billing::Invoice", Action::Create), "INVOICE_CREATED.billing");
//! assert_eq!(&*names.derive("Invoice", Action::Update), "INVOICE_UPDATED");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::aggregate::Action;
use crate::inflector::{split_type_name, underscore};

/// Compute the event name for `type_name` and `action` without caching.
///
/// The last path segment, upper-cased, is followed by the action suffix; the
/// enclosing namespace segments are appended innermost first, dot-joined.
/// `Billing::Accounts::Invoice` + create gives `INVOICE_CREATED.accounts.billing`.
pub fn event_name(type_name: &str, action: Action) -> String {
    let (mut namespace, last) = split_type_name(type_name);
    let mut name = format!("{}_{}", last.to_uppercase(), action.suffix());
    if !namespace.is_empty() {
        namespace.reverse();
        name.push('.');
        name.push_str(&namespace.join("."));
    }
    name
}

/// Normalize a caller-supplied event name: `InvoicePaid` becomes `INVOICE_PAID`.
pub fn normalize_event(name: &str) -> String {
    underscore(name.trim()).to_uppercase()
}

/// Read-through cache of event names keyed by aggregate type and action.
///
/// Entries are computed once and kept for the life of the registry. Two
/// threads racing on a miss compute the same value, so the first insert wins.
/// Only single map operations run under the lock, so a poisoned map is still
/// consistent and is read through.
#[derive(Default)]
pub struct EventNameRegistry {
    names: RwLock<HashMap<(&'static str, Action), Arc<str>>>,
}

impl EventNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, shared by every repository that does not
    /// bring its own.
    pub fn global() -> Arc<EventNameRegistry> {
        static REGISTRY: OnceLock<Arc<EventNameRegistry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(|| Arc::new(EventNameRegistry::new())))
    }

    pub fn derive(&self, type_name: &'static str, action: Action) -> Arc<str> {
        let slot = (type_name, action);

        {
            let names = self
                .names
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(name) = names.get(&slot) {
                return Arc::clone(name);
            }
        }

        let derived: Arc<str> = Arc::from(event_name(type_name, action));
        debug!(aggregate = type_name, %action, event = %derived, "derived outbox event name");

        let mut names = self
            .names
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(names.entry(slot).or_insert(derived))
    }

    /// Names for all three actions of `type_name`.
    pub fn derive_all(&self, type_name: &'static str) -> [Arc<str>; 3] {
        Action::ALL.map(|action| self.derive(type_name, action))
    }

    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_type() {
        assert_eq!(event_name("Billing::Invoice", Action::Create), "INVOICE_CREATED.billing");
        assert_eq!(
            event_name("Uuid::FakeModel", Action::Destroy),
            "FAKE_MODEL_DESTROYED.uuid"
        );
    }

    #[test]
    fn nested_namespace_is_reversed() {
        assert_eq!(
            event_name("Billing::Accounts::Invoice", Action::Update),
            "INVOICE_UPDATED.accounts.billing"
        );
    }

    #[test]
    fn top_level_type_has_no_suffix() {
        assert_eq!(event_name("Invoice", Action::Update), "INVOICE_UPDATED");
        assert_eq!(event_name("FakeModel", Action::Create), "FAKE_MODEL_CREATED");
    }

    #[test]
    fn registry_caches_per_type_and_action() {
        let names = EventNameRegistry::new();
        let first = names.derive("Billing::Invoice", Action::Create);
        let second = names.derive("Billing::Invoice", Action::Create);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(names.len(), 1);

        names.derive("Billing::Invoice", Action::Destroy);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn derive_all_covers_every_action() {
        let names = EventNameRegistry::new();
        let [created, updated, destroyed] = names.derive_all("FakeModel");
        assert_eq!(&*created, "FAKE_MODEL_CREATED");
        assert_eq!(&*updated, "FAKE_MODEL_UPDATED");
        assert_eq!(&*destroyed, "FAKE_MODEL_DESTROYED");
    }

    #[test]
    fn concurrent_first_access_agrees() {
        let names = Arc::new(EventNameRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let names = Arc::clone(&names);
                std::thread::spawn(move || names.derive("Billing::Invoice", Action::Update))
            })
            .collect();

        let results: Vec<Arc<str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|name| &**name == "INVOICE_UPDATED.billing"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn global_registry_is_shared() {
        assert!(Arc::ptr_eq(&EventNameRegistry::global(), &EventNameRegistry::global()));
    }

    #[test]
    fn normalizes_override_names() {
        assert_eq!(normalize_event("InvoicePaid"), "INVOICE_PAID");
        assert_eq!(normalize_event("invoice_paid"), "INVOICE_PAID");
        assert_eq!(normalize_event("Billing::InvoicePaid"), "BILLING/INVOICE_PAID");
    }
}
