//! Outbox - Event rows and the stores they are written to.
//!
//! ## Example
//!
//! ```
//! use transactional_outbox::{OutboxModel, OutboxStore, StoreRegistry};
//!
//! let stores = StoreRegistry::new()
//!     .with(OutboxModel::new("Outbox", "outboxes"))
//!     .with(OutboxModel::new("Billing::Outbox", "billing_outboxes"));
//!
//! assert_eq!(stores.get("Billing::Outbox").unwrap().table(), "billing_outboxes");
//! ```

mod registry;
mod row;
mod store;

pub use registry::StoreRegistry;
pub use row::OutboxRow;
pub use store::{validate_presence, OutboxModel, OutboxStore, BLANK};
