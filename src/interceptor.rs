//! Interceptor - Writes the outbox row for an aggregate mutation.
//!
//! Runs after the aggregate write has been staged and before the transaction
//! commits, so the outbox row shares the aggregate's fate.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::aggregate::{Action, Outboxable, Phase, Record};
use crate::database::Transaction;
use crate::error::{Errors, OutboxError};
use crate::events::EventNameRegistry;
use crate::outbox::OutboxRow;
use crate::payload::{Changes, Payload};
use crate::resolver::OutboxResolver;

/// Prefix outbox validation errors are filed under on the aggregate.
pub const ERROR_PREFIX: &str = "outbox";

/// Outcome of intercepting a mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Interception {
    /// The outbox row was staged in the transaction.
    Recorded(OutboxRow),
    /// The outbox row failed validation; errors are keyed `outbox.<field>`.
    /// Nothing was staged and the transaction must not commit.
    Rejected(Errors),
}

impl Interception {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Interception::Recorded(_))
    }
}

pub struct Interceptor {
    events: Arc<EventNameRegistry>,
    resolver: Arc<OutboxResolver>,
}

impl Interceptor {
    pub fn new(events: Arc<EventNameRegistry>, resolver: Arc<OutboxResolver>) -> Self {
        Self { events, resolver }
    }

    pub fn events(&self) -> &Arc<EventNameRegistry> {
        &self.events
    }

    pub fn resolver(&self) -> &Arc<OutboxResolver> {
        &self.resolver
    }

    /// Stage the outbox row for `action` on `record` inside `tx`.
    ///
    /// `current` is the aggregate's field snapshot as written (or, for
    /// destroy, as it was before removal); `changes` holds the old and new
    /// values of the fields this save changed. A pending override event on
    /// the record is consumed here.
    ///
    /// Unresolvable stores and storage failures are returned as errors;
    /// validation failures are returned as [`Interception::Rejected`].
    pub fn after_mutation<A: Outboxable>(
        &self,
        tx: &mut Transaction<'_>,
        record: &mut Record<A>,
        action: Action,
        current: &Map<String, Value>,
        changes: &Changes,
    ) -> Result<Interception, OutboxError> {
        let event = match record.take_outbox_event() {
            Some(event) => event,
            None => self.events.derive(A::TYPE_NAME, action).to_string(),
        };
        let store = self.resolver.resolve(A::TYPE_NAME)?;

        record.set_phase(Phase::BuildingOutboxPayload);
        let identifier = record.identifier();
        let schema = self
            .resolver
            .configuration()
            .outbox_schema(identifier.key_kind());
        let payload = Payload::build(action, current, changes).format(&schema)?;
        let row = OutboxRow::new(event, A::TYPE_NAME, identifier, payload);

        let invalid = store.validate(&row);
        if !invalid.is_empty() {
            let mut errors = Errors::new();
            errors.import(&invalid, ERROR_PREFIX);
            warn!(
                aggregate = A::TYPE_NAME,
                event = %row.event,
                errors = %errors,
                "outbox row rejected"
            );
            return Ok(Interception::Rejected(errors));
        }

        record.set_phase(Phase::PersistingOutboxRow);
        store.persist(tx, &row)?;
        info!(
            aggregate = A::TYPE_NAME,
            aggregate_identifier = %row.aggregate_identifier,
            event = %row.event,
            outbox = store.name(),
            identifier = %row.identifier,
            "outbox row staged"
        );

        Ok(Interception::Recorded(row))
    }
}
