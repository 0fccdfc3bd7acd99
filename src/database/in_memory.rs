//! InMemoryDatabase - HashMap-backed database for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{Database, Write};
use crate::error::StoreError;

/// Internal stored representation of a row.
#[derive(Clone)]
struct StoredRow {
    row: Value,
    /// Insertion order, so `all` returns rows oldest first.
    seq: u64,
}

type Table = HashMap<String, StoredRow>;

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Table>,
    next_seq: u64,
}

/// In-memory database backed by a HashMap per table.
///
/// Clone-friendly via Arc: clones share storage.
#[derive(Clone)]
pub struct InMemoryDatabase {
    inner: Arc<RwLock<Inner>>,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Database for InMemoryDatabase {
    fn find(&self, table: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;

        Ok(inner
            .tables
            .get(table)
            .and_then(|rows| rows.get(key))
            .map(|stored| stored.row.clone()))
    }

    fn all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;

        let mut rows: Vec<&StoredRow> = inner
            .tables
            .get(table)
            .map(|rows| rows.values().collect())
            .unwrap_or_default();
        rows.sort_by_key(|stored| stored.seq);

        Ok(rows.into_iter().map(|stored| stored.row.clone()).collect())
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;

        Ok(inner.tables.get(table).map_or(0, |rows| rows.len()))
    }

    fn apply(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))?;

        // Work on copies of the touched tables so a failing write leaves no trace.
        let mut working: HashMap<String, Table> = HashMap::new();
        for write in &writes {
            if !working.contains_key(write.table()) {
                let table = inner.tables.get(write.table()).cloned().unwrap_or_default();
                working.insert(write.table().to_string(), table);
            }
        }

        let mut seq = inner.next_seq;
        for write in writes {
            match write {
                Write::Insert { table, key, row } => {
                    let rows = working.entry(table.clone()).or_default();
                    if rows.contains_key(&key) {
                        return Err(StoreError::DuplicateKey { table, key });
                    }
                    seq += 1;
                    rows.insert(key, StoredRow { row, seq });
                }
                Write::Update { table, key, row } => {
                    let rows = working.entry(table.clone()).or_default();
                    match rows.get_mut(&key) {
                        Some(stored) => stored.row = row,
                        None => return Err(StoreError::NotFound { table, key }),
                    }
                }
                Write::Delete { table, key } => {
                    let rows = working.entry(table.clone()).or_default();
                    if rows.remove(&key).is_none() {
                        return Err(StoreError::NotFound { table, key });
                    }
                }
            }
        }

        inner.next_seq = seq;
        inner.tables.extend(working);
        Ok(())
    }
}
