use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};

use crate::error::Errors;
use crate::events::normalize_event;
use crate::payload::Changes;

/// Where a record is in the save lifecycle.
///
/// A save moves from `Idle` through the intermediate phases and ends in
/// `Committed` (aggregate and outbox row durable) or `Failed` (nothing durable).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    EventNameAssigned,
    PersistingAggregate,
    AggregatePersisted,
    BuildingOutboxPayload,
    PersistingOutboxRow,
    Committed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Committed | Phase::Failed)
    }
}

#[derive(Clone, Debug)]
enum State {
    New,
    Persisted {
        key: String,
        snapshot: Map<String, Value>,
    },
    Destroyed,
}

/// An aggregate instance together with its persistence state.
///
/// Derefs to the aggregate, so fields can be read and assigned directly
/// before the next save.
#[derive(Clone, Debug)]
pub struct Record<A> {
    data: A,
    state: State,
    errors: Errors,
    previous_changes: Changes,
    outbox_event: Option<String>,
    phase: Phase,
}

impl<A> Record<A> {
    /// Wrap an aggregate that has not been persisted yet.
    pub fn new(data: A) -> Self {
        Self {
            data,
            state: State::New,
            errors: Errors::new(),
            previous_changes: Changes::new(),
            outbox_event: None,
            phase: Phase::Idle,
        }
    }

    pub(crate) fn loaded(data: A, key: String, snapshot: Map<String, Value>) -> Self {
        let mut record = Self::new(data);
        record.state = State::Persisted { key, snapshot };
        record
    }

    pub fn data(&self) -> &A {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut A {
        &mut self.data
    }

    pub fn into_inner(self) -> A {
        self.data
    }

    pub fn is_new_record(&self) -> bool {
        matches!(self.state, State::New)
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self.state, State::Persisted { .. })
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, State::Destroyed)
    }

    /// Storage key the aggregate was last persisted under.
    pub fn persisted_key(&self) -> Option<&str> {
        match &self.state {
            State::Persisted { key, .. } => Some(key),
            State::New | State::Destroyed => None,
        }
    }

    /// Field values as of the last successful save or load.
    pub fn persisted_snapshot(&self) -> Option<&Map<String, Value>> {
        match &self.state {
            State::Persisted { snapshot, .. } => Some(snapshot),
            State::New | State::Destroyed => None,
        }
    }

    /// Validation errors from the last save.
    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Fields changed by the last successful save, as `(old, new)` pairs.
    pub fn previous_changes(&self) -> &Changes {
        &self.previous_changes
    }

    /// Override event pending for the next save.
    pub fn outbox_event(&self) -> Option<&str> {
        self.outbox_event.as_deref()
    }

    /// Set a one-shot event name for the next save. Blank names are ignored.
    pub fn set_outbox_event(&mut self, event: &str) {
        if !event.trim().is_empty() {
            self.outbox_event = Some(normalize_event(event));
        }
    }

    pub(crate) fn take_outbox_event(&mut self) -> Option<String> {
        self.outbox_event.take()
    }

    pub(crate) fn clear_outbox_event(&mut self) {
        self.outbox_event = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn mark_persisted(
        &mut self,
        key: String,
        snapshot: Map<String, Value>,
        changes: Changes,
    ) {
        self.state = State::Persisted { key, snapshot };
        self.previous_changes = changes;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.state = State::Destroyed;
        self.previous_changes = Changes::new();
    }
}

impl<A> Deref for Record<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.data
    }
}

impl<A> DerefMut for Record<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.data
    }
}
