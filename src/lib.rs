//! Transactional outbox for aggregate persistence.
//!
//! Every create, update or destroy of an [`Outboxable`] aggregate writes an
//! event row into a configured outbox store inside the same transaction as
//! the aggregate write. Either both become durable or neither does.

extern crate self as transactional_outbox;

mod aggregate;
pub mod config;
mod database;
mod error;
mod events;
pub mod inflector;
mod interceptor;
mod outbox;
mod payload;
mod repository;
mod resolver;

pub use aggregate::{Action, AggregateIdentifier, Outboxable, Phase, Record};
pub use config::{
    configuration, configure, reset, Adapter, Column, ColumnType, Configuration, KeyKind,
    OutboxSchema, DEFAULT_KEY,
};
pub use database::{Database, InMemoryDatabase, Transaction, Write};
pub use error::{ConfigurationError, Errors, FieldError, OutboxError, StoreError};
pub use events::{event_name, normalize_event, EventNameRegistry};
pub use interceptor::{Interception, Interceptor, ERROR_PREFIX};
pub use outbox::{validate_presence, OutboxModel, OutboxRow, OutboxStore, StoreRegistry, BLANK};
pub use payload::{diff, snapshot, Changes, Payload};
pub use repository::{Repository, SaveOptions};
pub use resolver::OutboxResolver;

// Derive macro for `Outboxable`
pub use transactional_outbox_macros::Outboxable;
