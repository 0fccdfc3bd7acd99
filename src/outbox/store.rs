//! OutboxStore - The table outbox rows of a namespace are written to.

use std::sync::Arc;

use serde_json::Value;

use super::OutboxRow;
use crate::database::{Database, Transaction};
use crate::error::{Errors, OutboxError};

/// Message used for missing required attributes.
pub const BLANK: &str = "can't be blank";

/// A concrete outbox table.
pub trait OutboxStore: Send + Sync {
    /// Name the store is registered and configured under (e.g. `"Uuid::Outbox"`).
    fn name(&self) -> &str;

    fn table(&self) -> &str;

    /// Validation errors for `row`; empty when the row may be persisted.
    fn validate(&self, row: &OutboxRow) -> Errors {
        validate_presence(row)
    }

    /// Stage `row` in `tx`, keyed by its identifier.
    fn persist(&self, tx: &mut Transaction<'_>, row: &OutboxRow) -> Result<(), OutboxError> {
        tx.insert(self.table(), &row.identifier, row.to_value()?)?;
        Ok(())
    }

    /// All rows of this store, oldest first.
    fn rows(&self, db: &dyn Database) -> Result<Vec<OutboxRow>, OutboxError> {
        db.all(self.table())?
            .into_iter()
            .map(OutboxRow::from_value)
            .collect()
    }

    fn count(&self, db: &dyn Database) -> Result<usize, OutboxError> {
        Ok(db.count(self.table())?)
    }
}

/// Presence checks every outbox row must pass.
pub fn validate_presence(row: &OutboxRow) -> Errors {
    let mut errors = Errors::new();
    if row.identifier.trim().is_empty() {
        errors.add("identifier", BLANK);
    }
    if row.event.trim().is_empty() {
        errors.add("event", BLANK);
    }
    if payload_is_blank(&row.payload) {
        errors.add("payload", BLANK);
    }
    if row.aggregate.trim().is_empty() {
        errors.add("aggregate", BLANK);
    }
    if row.aggregate_identifier.is_blank() {
        errors.add("aggregate_identifier", BLANK);
    }
    errors
}

fn payload_is_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

type Validator = Arc<dyn Fn(&OutboxRow, &mut Errors) + Send + Sync>;

/// Stock outbox store: a named table with presence validation plus any
/// extra validators.
#[derive(Clone)]
pub struct OutboxModel {
    name: String,
    table: String,
    validators: Vec<Validator>,
}

impl OutboxModel {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            validators: Vec::new(),
        }
    }

    /// Add a validation rule run after the presence checks.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&OutboxRow, &mut Errors) + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }
}

impl std::fmt::Debug for OutboxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxModel")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl OutboxStore for OutboxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn validate(&self, row: &OutboxRow) -> Errors {
        let mut errors = validate_presence(row);
        for validator in &self.validators {
            validator(row, &mut errors);
        }
        errors
    }
}
