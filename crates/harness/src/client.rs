use std::cell::RefCell;
use std::rc::Rc;

use guestlist_core::{ConfirmationStatus, GuestField, GuestId, GuestPatch, NewGuest, SubscriptionId};
use guestlist_engine::{BoardConfig, CommitOutcome, EngineError, GuestBoard, GuestDraft, PendingCommit};
use guestlist_storage::{ErrorCallback, GuestStore, SnapshotCallback, SqliteStore, StorageError};

pub type SharedStore = Rc<RefCell<SqliteStore>>;

/// Passes every call through to the store and counts the writes.
pub struct CountingStore<'a> {
    inner: &'a mut SqliteStore,
    writes: &'a mut usize,
}

impl<'a> CountingStore<'a> {
    pub fn new(inner: &'a mut SqliteStore, writes: &'a mut usize) -> Self {
        Self { inner, writes }
    }
}

impl GuestStore for CountingStore<'_> {
    fn subscribe(
        &mut self,
        on_update: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Result<SubscriptionId, StorageError> {
        self.inner.subscribe(on_update, on_error)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    fn add(&mut self, guest: &NewGuest) -> Result<GuestId, StorageError> {
        *self.writes += 1;
        self.inner.add(guest)
    }

    fn update(&mut self, id: GuestId, patch: &GuestPatch) -> Result<(), StorageError> {
        *self.writes += 1;
        self.inner.update(id, patch)
    }

    fn remove(&mut self, id: GuestId) -> Result<(), StorageError> {
        *self.writes += 1;
        self.inner.remove(id)
    }

    fn force_reconnect(&mut self) -> Result<(), StorageError> {
        self.inner.force_reconnect()
    }

    fn add_batch(&mut self, guests: &[NewGuest]) -> Result<Vec<GuestId>, StorageError> {
        *self.writes += 1;
        self.inner.add_batch(guests)
    }

    fn reset_statuses(&mut self, ids: &[GuestId]) -> Result<(), StorageError> {
        *self.writes += 1;
        self.inner.reset_statuses(ids)
    }
}

/// One board attached to a store shared with other clients.
pub struct TestClient {
    pub board: GuestBoard,
    store: SharedStore,
    writes: usize,
}

impl TestClient {
    pub fn connect(store: SharedStore, config: BoardConfig) -> Result<Self, EngineError> {
        let mut client = Self {
            board: GuestBoard::new(config),
            store,
            writes: 0,
        };
        client.with_store(|board, store| board.attach(store))?;
        Ok(client)
    }

    /// Write calls this client has sent to the store.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn pump(&mut self, now: u64) -> usize {
        self.board.pump(now)
    }

    /// Id of the first guest with this exact name in the current snapshot.
    pub fn find(&self, name: &str) -> Option<GuestId> {
        self.board
            .view()
            .records()
            .iter()
            .find(|record| record.name == name)
            .map(|record| record.id)
    }

    pub fn visible_names(&self) -> Vec<String> {
        self.board
            .view()
            .visible_records()
            .map(|record| record.name.clone())
            .collect()
    }

    pub fn edit_and_blur(
        &mut self,
        id: GuestId,
        field: GuestField,
        value: &str,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        self.board.focus(id, field)?;
        self.board.edit(id, field, value)?;
        self.blur(id, field, now)
    }

    pub fn blur(&mut self, id: GuestId, field: GuestField, now: u64) -> Result<CommitOutcome, EngineError> {
        self.with_store(|board, store| board.blur(store, id, field, now))
    }

    pub fn set_status(
        &mut self,
        id: GuestId,
        status: ConfirmationStatus,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        self.with_store(|board, store| board.set_status(store, id, status, now))
    }

    pub fn set_already_spoke(&mut self, id: GuestId, value: bool, now: u64) -> Result<CommitOutcome, EngineError> {
        self.with_store(|board, store| board.set_already_spoke(store, id, value, now))
    }

    /// Send a prepared commit now and feed the result back.
    pub fn send(&mut self, pending: &PendingCommit, now: u64) -> CommitOutcome {
        let result = self.with_store(|_, store| store.update(pending.id, &pending.patch));
        self.board.complete(pending, result, now)
    }

    pub fn add_guest(&mut self, draft: &GuestDraft) -> Result<GuestId, EngineError> {
        self.with_store(|board, store| board.add_guest(store, draft))
    }

    pub fn delete_guest(&mut self, id: GuestId) -> Result<(), EngineError> {
        self.with_store(|board, store| board.delete_guest(store, id))
    }

    pub fn reset_all(&mut self) -> Result<usize, EngineError> {
        self.with_store(|board, store| board.reset_all(store))
    }

    pub fn refresh(&mut self, now: u64) -> Result<bool, EngineError> {
        self.with_store(|board, store| board.refresh(store, now))
    }

    pub fn detach(&mut self) {
        self.with_store(|board, store| board.detach(store))
    }

    fn with_store<T>(&mut self, f: impl FnOnce(&mut GuestBoard, &mut dyn GuestStore) -> T) -> T {
        let mut inner = self.store.borrow_mut();
        let mut counting = CountingStore::new(&mut inner, &mut self.writes);
        f(&mut self.board, &mut counting)
    }
}
