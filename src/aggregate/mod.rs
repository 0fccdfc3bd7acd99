//! Aggregates - Plain structs enrolled in outbox tracking.
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use transactional_outbox::{AggregateIdentifier, Outboxable};
//!
//! #[derive(Clone, Serialize, Deserialize, Outboxable)]
//! #[outboxable(name = "Billing::Invoice", table = "invoices")]
//! struct Invoice {
//!     #[outboxable(identifier)]
//!     id: i64,
//!     customer: String,
//! }
//!
//! let invoice = Invoice { id: 7, customer: "bob".into() };
//! assert_eq!(invoice.identifier(), AggregateIdentifier::Integer(7));
//! assert_eq!(Invoice::TYPE_NAME, "Billing::Invoice");
//! ```

mod record;

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::config::KeyKind;
use crate::error::{Errors, OutboxError};

pub use record::{Phase, Record};

/// Trait for types whose mutations are recorded in an outbox.
pub trait Outboxable: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Fully qualified, `::`-separated type name (e.g. `"Billing::Invoice"`).
    /// Event names and outbox resolution are derived from it.
    const TYPE_NAME: &'static str;

    /// The table this aggregate is stored in.
    const TABLE: &'static str;

    /// Primary key of this aggregate instance.
    fn identifier(&self) -> AggregateIdentifier;

    /// Add validation errors for this aggregate. No rules by default.
    fn validate(&self, _errors: &mut Errors) {}
}

/// Primary key of an aggregate: sequential or UUID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateIdentifier {
    Integer(i64),
    Uuid(Uuid),
    Text(String),
}

impl AggregateIdentifier {
    /// Storage key of the aggregate row.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            AggregateIdentifier::Text(text) => text.trim().is_empty(),
            AggregateIdentifier::Integer(_) | AggregateIdentifier::Uuid(_) => false,
        }
    }

    /// Column kind the identifier is stored as in `aggregate_identifier`.
    pub fn key_kind(&self) -> KeyKind {
        match self {
            AggregateIdentifier::Integer(_) => KeyKind::Integer,
            AggregateIdentifier::Uuid(_) => KeyKind::Uuid,
            AggregateIdentifier::Text(_) => KeyKind::String,
        }
    }
}

impl fmt::Display for AggregateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateIdentifier::Integer(id) => write!(f, "{}", id),
            AggregateIdentifier::Uuid(id) => write!(f, "{}", id),
            AggregateIdentifier::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for AggregateIdentifier {
    fn from(id: i64) -> Self {
        AggregateIdentifier::Integer(id)
    }
}

impl From<i32> for AggregateIdentifier {
    fn from(id: i32) -> Self {
        AggregateIdentifier::Integer(i64::from(id))
    }
}

impl From<u32> for AggregateIdentifier {
    fn from(id: u32) -> Self {
        AggregateIdentifier::Integer(i64::from(id))
    }
}

impl From<Uuid> for AggregateIdentifier {
    fn from(id: Uuid) -> Self {
        AggregateIdentifier::Uuid(id)
    }
}

impl From<String> for AggregateIdentifier {
    fn from(id: String) -> Self {
        AggregateIdentifier::Text(id)
    }
}

impl From<&str> for AggregateIdentifier {
    fn from(id: &str) -> Self {
        AggregateIdentifier::Text(id.to_string())
    }
}

/// Lifecycle action an outbox event is recorded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Destroy,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Create, Action::Update, Action::Destroy];

    /// Suffix used in event names.
    pub fn suffix(self) -> &'static str {
        match self {
            Action::Create => "CREATED",
            Action::Update => "UPDATED",
            Action::Destroy => "DESTROYED",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "destroy" => Ok(Action::Destroy),
            other => Err(OutboxError::RecordNotSaved(format!(
                "unsupported outbox action `{}`",
                other
            ))),
        }
    }
}
