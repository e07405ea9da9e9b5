//! "Object saved" notification channel.
//!
//! Listeners are invoked synchronously by the saving [`Session`], in
//! subscription order, after the row has been written.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::debug;

use super::content_types::ObjectRef;
use super::{Session, StoreError};

/// A row was inserted (`created`) or rewritten.
#[derive(Debug, Clone, Copy)]
pub struct SaveEvent<'a> {
    pub object: &'a ObjectRef,
    pub value: &'a Value,
    pub created: bool,
}

/// Receiver for [`SaveEvent`]s.
pub trait SaveListener: Send + Sync {
    fn on_save(&self, session: &mut Session<'_>, event: &SaveEvent<'_>) -> Result<(), StoreError>;
}

/// Handle returned by [`Signals::subscribe`]; identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of subscribed listeners.
#[derive(Default)]
pub struct Signals {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn SaveListener>)>>,
}

impl Signals {
    pub fn subscribe(&self, listener: Arc<dyn SaveListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.lock();
        listeners.push((id, listener));
        debug!(listener = id.0, total = listeners.len(), "listener subscribed");
        id
    }

    /// Remove the subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(candidate, _)| *candidate != id);
        let removed = listeners.len() != before;
        debug!(listener = id.0, removed, total = listeners.len(), "listener unsubscribed");
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Current listeners, cloned so they can run without holding the lock.
    pub(super) fn snapshot(&self) -> Vec<Arc<dyn SaveListener>> {
        self.lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn SaveListener>)>> {
        // The list is only ever pushed to or filtered; a panic elsewhere cannot
        // leave it half-updated.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ContentTypes, Database};
    use crate::test_support::Widget;

    struct Tally(Mutex<Vec<(String, bool)>>);

    impl SaveListener for Tally {
        fn on_save(&self, _: &mut Session<'_>, event: &SaveEvent<'_>) -> Result<(), StoreError> {
            self.0
                .lock()
                .expect("tally")
                .push((event.object.to_string(), event.created));
            Ok(())
        }
    }

    #[test]
    fn subscribe_and_unsubscribe_round_trip() {
        let signals = Signals::default();
        let tally = Arc::new(Tally(Mutex::new(Vec::new())));
        let id = signals.subscribe(tally);
        assert_eq!(signals.listener_count(), 1);
        assert!(signals.unsubscribe(id));
        assert!(!signals.unsubscribe(id));
        assert_eq!(signals.listener_count(), 0);
    }

    /// Inserts report `created=true`, updates report `created=false`.
    #[test]
    fn session_writes_emit_events() {
        let db = Database::in_memory(ContentTypes::default());
        let tally = Arc::new(Tally(Mutex::new(Vec::new())));
        let id = db.signals().subscribe(tally.clone());

        let mut session = db.session().expect("session");
        let mut widget = session.insert(Widget::named("gear")).expect("insert");
        widget.model.name = "cog".to_string();
        session.update(&widget).expect("update");
        drop(session);
        db.signals().unsubscribe(id);

        let seen = tally.0.lock().expect("tally").clone();
        assert_eq!(
            seen,
            vec![("widget #1".to_string(), true), ("widget #1".to_string(), false)]
        );
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        struct Mark(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl SaveListener for Mark {
            fn on_save(&self, _: &mut Session<'_>, _: &SaveEvent<'_>) -> Result<(), StoreError> {
                self.1.lock().expect("order").push(self.0);
                Ok(())
            }
        }

        let db = Database::in_memory(ContentTypes::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        db.signals().subscribe(Arc::new(Mark("first", order.clone())));
        db.signals().subscribe(Arc::new(Mark("second", order.clone())));

        let mut session = db.session().expect("session");
        session.insert(Widget::named("gear")).expect("insert");

        assert_eq!(*order.lock().expect("order"), vec!["first", "second"]);
    }
}
