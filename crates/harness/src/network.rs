use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use guestlist_core::{GuestId, NewGuest};
use guestlist_engine::{BoardConfig, EngineError};
use guestlist_storage::{GuestStore, SqliteStore, StorageError};

use crate::client::{SharedStore, TestClient};

/// Several clients on one store, driven by a manual clock in milliseconds.
pub struct TestNetwork {
    store: SharedStore,
    clients: Vec<TestClient>,
    now: u64,
}

impl TestNetwork {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::with_store(SqliteStore::open_in_memory()?))
    }

    pub fn with_store(store: SqliteStore) -> Self {
        Self {
            store: Rc::new(RefCell::new(store)),
            clients: Vec::new(),
            now: 0,
        }
    }

    pub fn add_client(&mut self) -> Result<usize, EngineError> {
        self.add_client_with(BoardConfig::default())
    }

    /// Attach a new client and apply its initial snapshot.
    pub fn add_client_with(&mut self, config: BoardConfig) -> Result<usize, EngineError> {
        let mut client = TestClient::connect(Rc::clone(&self.store), config)?;
        client.pump(self.now);
        let index = self.clients.len();
        self.clients.push(client);
        Ok(index)
    }

    pub fn client(&self, index: usize) -> &TestClient {
        &self.clients[index]
    }

    pub fn client_mut(&mut self, index: usize) -> &mut TestClient {
        &mut self.clients[index]
    }

    pub fn store(&self) -> RefMut<'_, SqliteStore> {
        self.store.borrow_mut()
    }

    pub fn shared_store(&self) -> SharedStore {
        Rc::clone(&self.store)
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Write guests directly, as another tool on the same collection would.
    pub fn seed(&mut self, guests: &[NewGuest]) -> Result<Vec<GuestId>, StorageError> {
        let ids = self.store.borrow_mut().add_batch(guests)?;
        self.settle();
        Ok(ids)
    }

    /// Deliver queued snapshots to every client without moving the clock.
    pub fn settle(&mut self) {
        for client in &mut self.clients {
            client.pump(self.now);
        }
    }

    /// Move the clock forward, deliver snapshots and fire due timers.
    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
        for client in &mut self.clients {
            client.pump(self.now);
            client.board.tick(self.now);
        }
    }
}
