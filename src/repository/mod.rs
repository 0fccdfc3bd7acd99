//! Repository - Save and destroy aggregates together with their outbox rows.
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use transactional_outbox::{
//!     Configuration, InMemoryDatabase, OutboxModel, Outboxable, Record, Repository,
//!     SaveOptions, StoreRegistry,
//! };
//!
//! #[derive(Clone, Serialize, Deserialize, Outboxable)]
//! #[outboxable(name = "Billing::Invoice", table = "invoices")]
//! struct Invoice {
//!     id: i64,
//!     customer: String,
//! }
//!
//! let repo = Repository::new(
//!     InMemoryDatabase::new(),
//!     Configuration::new().map("default", "Outbox"),
//!     StoreRegistry::new().with(OutboxModel::new("Outbox", "outboxes")),
//! );
//!
//! let mut invoice = Record::new(Invoice { id: 1, customer: "bob".into() });
//! assert!(repo.save(&mut invoice, SaveOptions::new())?);
//!
//! invoice.customer = "robert".into();
//! repo.save(&mut invoice, SaveOptions::event("InvoiceReassigned"))?;
//!
//! let events: Vec<String> = repo
//!     .outbox_rows::<Invoice>()?
//!     .into_iter()
//!     .map(|row| row.event)
//!     .collect();
//! assert_eq!(events, ["INVOICE_CREATED.billing", "INVOICE_REASSIGNED"]);
//! # Ok::<(), transactional_outbox::OutboxError>(())
//! ```

mod options;

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::aggregate::{Action, AggregateIdentifier, Outboxable, Phase, Record};
use crate::config::{self, Configuration};
use crate::database::{Database, Transaction};
use crate::error::{Errors, OutboxError, StoreError};
use crate::events::EventNameRegistry;
use crate::interceptor::{Interception, Interceptor};
use crate::outbox::{OutboxRow, OutboxStore, StoreRegistry};
use crate::payload::{diff, snapshot, Changes};
use crate::resolver::OutboxResolver;

pub use options::SaveOptions;

/// Persists [`Outboxable`] aggregates, writing one outbox row per mutation
/// in the same transaction as the aggregate write.
pub struct Repository<D> {
    db: D,
    interceptor: Interceptor,
}

impl<D: Database> Repository<D> {
    pub fn new(db: D, config: Configuration, stores: StoreRegistry) -> Self {
        Self::with_shared_stores(db, config, Arc::new(stores))
    }

    pub fn with_shared_stores(db: D, config: Configuration, stores: Arc<StoreRegistry>) -> Self {
        let resolver = Arc::new(OutboxResolver::new(config, stores));
        Self {
            db,
            interceptor: Interceptor::new(EventNameRegistry::global(), resolver),
        }
    }

    /// Build a repository from the process-wide configuration.
    pub fn from_global_config(db: D, stores: StoreRegistry) -> Self {
        Self::new(db, config::configuration(), stores)
    }

    /// Use `events` instead of the process-wide event name registry.
    pub fn with_event_names(mut self, events: Arc<EventNameRegistry>) -> Self {
        let resolver = Arc::clone(self.interceptor.resolver());
        self.interceptor = Interceptor::new(events, resolver);
        self
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn resolver(&self) -> &OutboxResolver {
        self.interceptor.resolver()
    }

    /// Save `record`, reporting validation failures as `Ok(false)` with the
    /// messages on `record.errors()`. Other failures are returned as errors.
    /// Either way a failed save leaves nothing behind in the database.
    pub fn save<A: Outboxable>(
        &self,
        record: &mut Record<A>,
        options: SaveOptions,
    ) -> Result<bool, OutboxError> {
        match self.save_strict(record, options) {
            Ok(()) => Ok(true),
            Err(OutboxError::RecordInvalid(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Save `record`, reporting validation failures as
    /// [`OutboxError::RecordInvalid`].
    pub fn save_strict<A: Outboxable>(
        &self,
        record: &mut Record<A>,
        options: SaveOptions,
    ) -> Result<(), OutboxError> {
        if record.is_destroyed() {
            return Err(OutboxError::RecordNotSaved(format!(
                "{} {} has been destroyed",
                A::TYPE_NAME,
                record.identifier()
            )));
        }

        record.errors_mut().clear();
        record.set_phase(Phase::Idle);
        if let Some(event) = options.outbox_event.as_deref() {
            record.set_outbox_event(event);
        }
        if record.outbox_event().is_some() {
            record.set_phase(Phase::EventNameAssigned);
        }

        let result = self.perform_save(record);
        self.finish(record, result)
    }

    /// Build, save and return a new record. Validation failures leave the
    /// record unsaved with its errors populated.
    pub fn create<A: Outboxable>(&self, data: A) -> Result<Record<A>, OutboxError> {
        let mut record = Record::new(data);
        self.save(&mut record, SaveOptions::new())?;
        Ok(record)
    }

    /// Apply `change` to the record and save it.
    pub fn update<A, F>(&self, record: &mut Record<A>, change: F) -> Result<bool, OutboxError>
    where
        A: Outboxable,
        F: FnOnce(&mut A),
    {
        change(record.data_mut());
        self.save(record, SaveOptions::new())
    }

    /// Delete a persisted record and write its destroy event.
    pub fn destroy<A: Outboxable>(&self, record: &mut Record<A>) -> Result<(), OutboxError> {
        let Some(key) = record.persisted_key().map(str::to_string) else {
            return Err(OutboxError::RecordNotSaved(format!(
                "{} {} is not persisted",
                A::TYPE_NAME,
                record.identifier()
            )));
        };

        record.errors_mut().clear();
        record.set_phase(Phase::Idle);
        let result = self.perform_destroy(record, &key);
        self.finish(record, result)
    }

    /// Load a persisted record by primary key.
    pub fn find<A: Outboxable>(
        &self,
        identifier: impl Into<AggregateIdentifier>,
    ) -> Result<Option<Record<A>>, OutboxError> {
        let key = identifier.into().key();
        let Some(row) = self.db.find(A::TABLE, &key)? else {
            return Ok(None);
        };
        let data: A = serde_json::from_value(row)?;
        let fields = snapshot(&data)?;
        Ok(Some(Record::loaded(data, key, fields)))
    }

    /// Reload a persisted record's fields, dropping unsaved changes.
    pub fn reload<A: Outboxable>(&self, record: &mut Record<A>) -> Result<(), OutboxError> {
        let key = record.persisted_key().map(str::to_string).ok_or_else(|| {
            OutboxError::RecordNotSaved(format!("{} is not persisted", A::TYPE_NAME))
        })?;
        match self.find::<A>(key.clone())? {
            Some(fresh) => {
                *record = fresh;
                Ok(())
            }
            None => Err(OutboxError::Store(StoreError::NotFound {
                table: A::TABLE.to_string(),
                key,
            })),
        }
    }

    pub fn count<A: Outboxable>(&self) -> Result<usize, OutboxError> {
        Ok(self.db.count(A::TABLE)?)
    }

    /// Outbox store the events of `A` are written to.
    pub fn outbox_store<A: Outboxable>(&self) -> Result<Arc<dyn OutboxStore>, OutboxError> {
        Ok(self.resolver().resolve(A::TYPE_NAME)?)
    }

    /// All rows of the outbox store `A` writes to, oldest first. Rows from
    /// other aggregates sharing the store are included.
    pub fn outbox_rows<A: Outboxable>(&self) -> Result<Vec<OutboxRow>, OutboxError> {
        self.outbox_store::<A>()?.rows(&self.db)
    }

    fn perform_save<A: Outboxable>(&self, record: &mut Record<A>) -> Result<(), OutboxError> {
        let mut errors = Errors::new();
        record.data().validate(&mut errors);
        if !errors.is_empty() {
            record.errors_mut().merge(errors);
            return Err(OutboxError::RecordInvalid(record.errors().clone()));
        }

        let current = snapshot(record.data())?;
        let key = record.identifier().key();
        let previous_key = record.persisted_key().map(str::to_string);
        let (action, changes) = match record.persisted_snapshot() {
            Some(previous) => (Action::Update, diff(previous, &current)),
            None => (Action::Create, Changes::new()),
        };

        let mut tx = Transaction::new(&self.db);
        record.set_phase(Phase::PersistingAggregate);
        let row = Value::Object(current.clone());
        match previous_key {
            Some(previous_key) if previous_key != key => {
                tx.delete(A::TABLE, &previous_key)?;
                tx.insert(A::TABLE, &key, row)?;
            }
            Some(_) => tx.update(A::TABLE, &key, row)?,
            None => tx.insert(A::TABLE, &key, row)?,
        }
        record.set_phase(Phase::AggregatePersisted);

        self.intercept(&mut tx, record, action, &current, &changes)?;

        tx.commit()?;
        record.mark_persisted(key, current, changes);
        Ok(())
    }

    fn perform_destroy<A: Outboxable>(
        &self,
        record: &mut Record<A>,
        key: &str,
    ) -> Result<(), OutboxError> {
        let current = snapshot(record.data())?;

        let mut tx = Transaction::new(&self.db);
        record.set_phase(Phase::PersistingAggregate);
        tx.delete(A::TABLE, key)?;
        record.set_phase(Phase::AggregatePersisted);

        self.intercept(&mut tx, record, Action::Destroy, &current, &Changes::new())?;

        tx.commit()?;
        record.mark_destroyed();
        Ok(())
    }

    /// Run the outbox hook inside `tx`, merging rejected outbox errors into
    /// the record's own errors.
    fn intercept<A: Outboxable>(
        &self,
        tx: &mut Transaction<'_>,
        record: &mut Record<A>,
        action: Action,
        current: &serde_json::Map<String, Value>,
        changes: &Changes,
    ) -> Result<(), OutboxError> {
        match self
            .interceptor
            .after_mutation(tx, record, action, current, changes)?
        {
            Interception::Recorded(_) => Ok(()),
            Interception::Rejected(errors) => {
                record.errors_mut().merge(errors);
                Err(OutboxError::RecordInvalid(record.errors().clone()))
            }
        }
    }

    fn finish<A: Outboxable>(
        &self,
        record: &mut Record<A>,
        result: Result<(), OutboxError>,
    ) -> Result<(), OutboxError> {
        record.clear_outbox_event();
        match &result {
            Ok(()) => record.set_phase(Phase::Committed),
            Err(err) => {
                record.set_phase(Phase::Failed);
                warn!(
                    aggregate = A::TYPE_NAME,
                    aggregate_identifier = %record.identifier(),
                    error = %err,
                    "mutation rolled back"
                );
            }
        }
        result
    }
}
