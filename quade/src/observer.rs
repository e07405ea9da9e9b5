//! Records every object created while a record executes.
//!
//! [`CreationObserver`] is a scoped subscription: constructing it subscribes
//! one listener bound to a record, dropping it unsubscribes that same listener.
//! Creations outside the guard's lifetime are never recorded.

use std::sync::Arc;

use tracing::debug;

use crate::models::RecordedObject;
use crate::store::{Id, ListenerId, SaveEvent, SaveListener, Session, Signals, StoreError};

/// Listener that links newly created objects to one record.
#[derive(Debug)]
pub struct RecordCreations {
    record: Id,
}

impl RecordCreations {
    pub fn new(record: Id) -> Self {
        Self { record }
    }
}

impl SaveListener for RecordCreations {
    fn on_save(&self, session: &mut Session<'_>, event: &SaveEvent<'_>) -> Result<(), StoreError> {
        if !event.created || event.object.is::<RecordedObject>() {
            return Ok(());
        }
        debug!(record = %self.record, object = %event.object, "recording created object");
        session.insert(RecordedObject {
            record: self.record,
            object: event.object.clone(),
        })?;
        Ok(())
    }
}

/// Guard holding the subscription of a [`RecordCreations`] listener.
pub struct CreationObserver<'a> {
    signals: &'a Signals,
    listener: ListenerId,
    record: Id,
}

impl<'a> CreationObserver<'a> {
    /// Subscribe a listener for `record` on `signals`.
    pub fn start(signals: &'a Signals, record: Id) -> Self {
        let listener = signals.subscribe(Arc::new(RecordCreations::new(record)));
        debug!(record = %record, "creation observer started");
        Self {
            signals,
            listener,
            record,
        }
    }

    pub fn record(&self) -> Id {
        self.record
    }
}

impl Drop for CreationObserver<'_> {
    fn drop(&mut self) {
        let removed = self.signals.unsubscribe(self.listener);
        debug!(record = %self.record, removed, "creation observer stopped");
    }
}
