use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::AggregateIdentifier;
use crate::error::OutboxError;
use crate::payload::Payload;

/// One domain event waiting in an outbox table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxRow {
    /// Unique per row; the outbox table's primary key.
    pub identifier: String,
    pub event: String,
    /// Fully qualified type name of the originating aggregate.
    pub aggregate: String,
    pub aggregate_identifier: AggregateIdentifier,
    /// `{before, after}` as structured JSON or as a JSON-encoded string,
    /// depending on the adapter's payload column.
    pub payload: Value,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl OutboxRow {
    /// Build a row with a fresh UUID identifier and current timestamps.
    pub fn new(
        event: impl Into<String>,
        aggregate: impl Into<String>,
        aggregate_identifier: AggregateIdentifier,
        payload: Value,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            identifier: Uuid::new_v4().to_string(),
            event: event.into(),
            aggregate: aggregate.into(),
            aggregate_identifier,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode the payload column, whichever form it was stored in.
    pub fn decoded_payload(&self) -> Result<Payload, OutboxError> {
        Payload::parse(&self.payload)
    }

    pub fn to_value(&self) -> Result<Value, OutboxError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self, OutboxError> {
        Ok(serde_json::from_value(value)?)
    }
}
