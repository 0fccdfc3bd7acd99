use std::sync::Arc;

use serde::{Deserialize, Serialize};
use transactional_outbox::{
    Configuration, Errors, InMemoryDatabase, OutboxError, OutboxModel, OutboxRow, OutboxStore,
    Repository, StoreRegistry, Transaction,
};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, transactional_outbox::Outboxable)]
#[outboxable(name = "FakeModel", table = "fake_models", validate = validate_fake_model)]
pub struct FakeModel {
    pub id: i64,
    pub name: String,
}

impl FakeModel {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

fn validate_fake_model(model: &FakeModel, errors: &mut Errors) {
    if model.name.trim().is_empty() {
        errors.add("name", "can't be blank");
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, transactional_outbox::Outboxable)]
#[outboxable(name = "Uuid::FakeModel", table = "uuid_fake_models")]
pub struct UuidFakeModel {
    pub identifier: Uuid,
    pub name: String,
}

impl UuidFakeModel {
    pub fn new(name: &str) -> Self {
        Self {
            identifier: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Outbox store that stages its row and then fails, like a database
/// rejecting the insert.
pub struct BrokenOutbox;

impl OutboxStore for BrokenOutbox {
    fn name(&self) -> &str {
        "Broken::Outbox"
    }

    fn table(&self) -> &str {
        "broken_outboxes"
    }

    fn persist(&self, tx: &mut Transaction<'_>, row: &OutboxRow) -> Result<(), OutboxError> {
        tx.insert(self.table(), &row.identifier, row.to_value()?)?;
        Err(OutboxError::RecordNotSaved("outbox insert failed".into()))
    }
}

pub fn stores() -> StoreRegistry {
    let stores = StoreRegistry::new()
        .with(OutboxModel::new("Outbox", "outboxes"))
        .with(OutboxModel::new("Uuid::Outbox", "uuid_outboxes"))
        .with(
            OutboxModel::new("Strict::Outbox", "strict_outboxes").with_validator(|row, errors| {
                if row.event.ends_with("_DESTROYED") {
                    errors.add("event", "is not allowed");
                }
            }),
        )
        .with(
            OutboxModel::new("Frozen::Outbox", "frozen_outboxes").with_validator(|row, errors| {
                if row.event.ends_with("_UPDATED") {
                    errors.add("event", "is frozen");
                }
            }),
        );
    stores.register_shared(Arc::new(BrokenOutbox));
    stores
}

pub fn configuration() -> Configuration {
    Configuration::new()
        .map("default", "Outbox")
        .map("uuid", "Uuid::Outbox")
}

pub fn repository(db: InMemoryDatabase, config: Configuration) -> Repository<InMemoryDatabase> {
    Repository::new(db, config, stores())
}
