use std::collections::BTreeMap;

use guestlist_core::SubscriptionId;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::{ErrorCallback, Snapshot, SnapshotCallback};

struct Listener {
    on_update: SnapshotCallback,
    on_error: ErrorCallback,
}

/// Live listeners of one store, notified in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, Listener>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, on_update: SnapshotCallback, on_error: ErrorCallback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId::from_raw(self.next_id);
        self.listeners.insert(id, Listener { on_update, on_error });
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn deliver_to(&mut self, id: SubscriptionId, snapshot: &Snapshot) {
        if let Some(listener) = self.listeners.get_mut(&id) {
            (listener.on_update)(snapshot);
        }
    }

    pub fn broadcast(&mut self, snapshot: &Snapshot) {
        debug!(
            sequence = snapshot.sequence,
            records = snapshot.records.len(),
            from_cache = snapshot.from_cache,
            listeners = self.listeners.len(),
            "broadcasting snapshot"
        );
        for listener in self.listeners.values_mut() {
            (listener.on_update)(snapshot);
        }
    }

    /// Report `err` to every listener and detach them all.
    /// Returns how many listeners were dropped.
    pub fn fail_all(&mut self, err: &StorageError) -> usize {
        let dropped = std::mem::take(&mut self.listeners);
        let count = dropped.len();
        for (_, mut listener) in dropped {
            (listener.on_error)(err);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn snapshot(sequence: u64) -> Snapshot {
        Snapshot {
            sequence,
            records: Vec::new(),
            from_cache: false,
        }
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriptionRegistry::new();
        let sink = seen.clone();
        let id = registry.register(
            Box::new(move |s: &Snapshot| sink.borrow_mut().push(s.sequence)),
            Box::new(|_: &StorageError| {}),
        );

        registry.broadcast(&snapshot(1));
        assert!(registry.remove(id));
        registry.broadcast(&snapshot(2));

        assert_eq!(*seen.borrow(), vec![1]);
        assert!(!registry.remove(id));
    }

    #[test]
    fn fail_all_notifies_then_detaches() {
        let errors = Rc::new(RefCell::new(0));
        let mut registry = SubscriptionRegistry::new();
        for _ in 0..2 {
            let errors = errors.clone();
            registry.register(
                Box::new(|_: &Snapshot| {}),
                Box::new(move |_: &StorageError| *errors.borrow_mut() += 1),
            );
        }

        let dropped = registry.fail_all(&StorageError::Subscription("listener dropped".into()));
        assert_eq!(dropped, 2);
        assert_eq!(*errors.borrow(), 2);
        assert!(registry.is_empty());
    }
}
