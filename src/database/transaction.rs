use std::collections::HashMap;

use serde_json::Value;

use super::{Database, Write};
use crate::error::StoreError;

/// Unit of work over a [`Database`].
///
/// Writes are checked against the database plus everything already staged,
/// then applied in one batch on [`commit`](Transaction::commit). Dropping the
/// transaction without committing discards every staged write.
pub struct Transaction<'a> {
    db: &'a dyn Database,
    writes: Vec<Write>,
    /// Staged view of touched rows; `None` marks a staged delete.
    staged: HashMap<(String, String), Option<Value>>,
}

impl<'a> Transaction<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self {
            db,
            writes: Vec::new(),
            staged: HashMap::new(),
        }
    }

    /// Read a row, seeing this transaction's own staged writes.
    pub fn find(&self, table: &str, key: &str) -> Result<Option<Value>, StoreError> {
        match self.staged.get(&(table.to_string(), key.to_string())) {
            Some(staged) => Ok(staged.clone()),
            None => self.db.find(table, key),
        }
    }

    pub fn exists(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.find(table, key)?.is_some())
    }

    pub fn insert(&mut self, table: &str, key: &str, row: Value) -> Result<(), StoreError> {
        if self.exists(table, key)? {
            return Err(StoreError::DuplicateKey {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        self.stage(Write::Insert {
            table: table.to_string(),
            key: key.to_string(),
            row,
        });
        Ok(())
    }

    pub fn update(&mut self, table: &str, key: &str, row: Value) -> Result<(), StoreError> {
        self.require(table, key)?;
        self.stage(Write::Update {
            table: table.to_string(),
            key: key.to_string(),
            row,
        });
        Ok(())
    }

    pub fn delete(&mut self, table: &str, key: &str) -> Result<(), StoreError> {
        self.require(table, key)?;
        self.stage(Write::Delete {
            table: table.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Writes staged so far, in order.
    pub fn pending(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every staged write atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        if self.writes.is_empty() {
            return Ok(());
        }
        self.db.apply(self.writes)
    }

    /// Discard every staged write.
    pub fn rollback(self) {}

    fn require(&self, table: &str, key: &str) -> Result<(), StoreError> {
        if self.exists(table, key)? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            })
        }
    }

    fn stage(&mut self, write: Write) {
        let slot = (write.table().to_string(), write.key().to_string());
        let value = match &write {
            Write::Insert { row, .. } | Write::Update { row, .. } => Some(row.clone()),
            Write::Delete { .. } => None,
        };
        self.staged.insert(slot, value);
        self.writes.push(write);
    }
}
