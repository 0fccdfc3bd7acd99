//! Database - Row storage with atomic batch writes.
//!
//! Aggregates and outbox rows are stored as JSON documents keyed by their
//! primary key. Mutations are staged in a [`Transaction`] and applied in one
//! batch, so an aggregate write and its outbox row land together or not at all.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use transactional_outbox::{Database, InMemoryDatabase, Transaction};
//!
//! let db = InMemoryDatabase::new();
//! let mut tx = Transaction::new(&db);
//! tx.insert("invoices", "1", json!({ "id": 1 }))?;
//! tx.insert("outboxes", "evt-1", json!({ "event": "INVOICE_CREATED" }))?;
//! tx.commit()?;
//!
//! assert_eq!(db.count("invoices")?, 1);
//! # Ok::<(), transactional_outbox::StoreError>(())
//! ```

mod in_memory;
mod transaction;

use serde_json::Value;

use crate::error::StoreError;

pub use in_memory::InMemoryDatabase;
pub use transaction::Transaction;

/// A staged row mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a new row. Fails if the key already exists.
    Insert { table: String, key: String, row: Value },
    /// Replace an existing row. Fails if the key does not exist.
    Update { table: String, key: String, row: Value },
    /// Remove a row. Fails if the key does not exist.
    Delete { table: String, key: String },
}

impl Write {
    pub fn table(&self) -> &str {
        match self {
            Write::Insert { table, .. } | Write::Update { table, .. } | Write::Delete { table, .. } => {
                table
            }
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Write::Insert { key, .. } | Write::Update { key, .. } | Write::Delete { key, .. } => key,
        }
    }
}

/// Storage backend for aggregates and outbox rows.
pub trait Database: Send + Sync {
    /// Get a row by primary key.
    fn find(&self, table: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// All rows of a table.
    fn all(&self, table: &str) -> Result<Vec<Value>, StoreError>;

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.all(table)?.len())
    }

    /// Apply a batch of writes atomically: either every write succeeds or
    /// none is visible.
    fn apply(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}

impl<D: Database + ?Sized> Database for std::sync::Arc<D> {
    fn find(&self, table: &str, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).find(table, key)
    }

    fn all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        (**self).all(table)
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        (**self).count(table)
    }

    fn apply(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        (**self).apply(writes)
    }
}
