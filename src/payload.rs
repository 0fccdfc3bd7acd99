//! Payloads - `{before, after}` snapshots attached to outbox rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregate::Action;
use crate::config::OutboxSchema;
use crate::error::OutboxError;

/// Changed fields mapped to their `(old, new)` values.
pub type Changes = BTreeMap<String, (Value, Value)>;

/// Serialize an aggregate into its field snapshot.
pub fn snapshot<A: Serialize>(aggregate: &A) -> Result<Map<String, Value>, OutboxError> {
    match serde_json::to_value(aggregate)? {
        Value::Object(fields) => Ok(fields),
        other => Err(OutboxError::Serialization(format!(
            "aggregate must serialize to an object, got {}",
            kind(&other)
        ))),
    }
}

/// Fields whose values differ between two snapshots. A field missing on one
/// side counts as `null` there.
pub fn diff(before: &Map<String, Value>, after: &Map<String, Value>) -> Changes {
    let mut changes = Changes::new();

    for (field, new) in after {
        let old = before.get(field).cloned().unwrap_or(Value::Null);
        if &old != new {
            changes.insert(field.clone(), (old, new.clone()));
        }
    }
    for (field, old) in before {
        if !after.contains_key(field) && !old.is_null() {
            changes.insert(field.clone(), (old.clone(), Value::Null));
        }
    }

    changes
}

/// State of the aggregate before and after a mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub before: Option<Map<String, Value>>,
    pub after: Option<Map<String, Value>>,
}

impl Payload {
    /// Build the payload for `action`.
    ///
    /// - create: no `before`, `after` is the current snapshot.
    /// - update: `after` is the current snapshot; `before` is the same
    ///   snapshot with every changed field put back to its old value.
    /// - destroy: `before` is the snapshot taken before removal, no `after`.
    pub fn build(action: Action, current: &Map<String, Value>, previous_changes: &Changes) -> Self {
        match action {
            Action::Create => Payload {
                before: None,
                after: Some(current.clone()),
            },
            Action::Update => {
                let mut before = current.clone();
                for (field, (old, _)) in previous_changes {
                    before.insert(field.clone(), old.clone());
                }
                Payload {
                    before: Some(before),
                    after: Some(current.clone()),
                }
            }
            Action::Destroy => Payload {
                before: Some(current.clone()),
                after: None,
            },
        }
    }

    /// The payload as structured JSON.
    pub fn to_value(&self) -> Value {
        let side = |fields: &Option<Map<String, Value>>| {
            fields.clone().map(Value::Object).unwrap_or(Value::Null)
        };
        let mut payload = Map::new();
        payload.insert("before".into(), side(&self.before));
        payload.insert("after".into(), side(&self.after));
        Value::Object(payload)
    }

    /// Shape the payload for the schema's payload column: structured JSON
    /// when the column is native JSON, a JSON-encoded string otherwise.
    pub fn format(&self, schema: &OutboxSchema) -> Result<Value, OutboxError> {
        let value = self.to_value();
        if schema.native_payload() {
            Ok(value)
        } else {
            Ok(Value::String(serde_json::to_string(&value)?))
        }
    }

    /// Decode a payload column value produced by [`Payload::format`].
    pub fn parse(column: &Value) -> Result<Self, OutboxError> {
        match column {
            Value::String(encoded) => Ok(serde_json::from_str(encoded)?),
            other => Ok(serde_json::from_value(other.clone())?),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
