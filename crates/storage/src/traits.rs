use guestlist_core::{GuestId, GuestPatch, GuestRecord, NewGuest, SubscriptionId};

use crate::error::StorageError;

/// One delivered state of the whole `guests` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Increases by one per delivery from a given store.
    pub sequence: u64,
    /// Records in store-assigned (creation) order.
    pub records: Vec<GuestRecord>,
    /// The view came from the local cache rather than a server round-trip.
    pub from_cache: bool,
}

pub type SnapshotCallback = Box<dyn FnMut(&Snapshot)>;
pub type ErrorCallback = Box<dyn FnMut(&StorageError)>;

/// Record Store Adapter: the only way the rest of the system reaches guest
/// documents. `lastUpdated` is always assigned by the store, never the caller.
pub trait GuestStore {
    /// Attach a listener. The initial snapshot is delivered before this
    /// returns; later snapshots follow every local or remote change. A listener
    /// that is dropped later is told through `on_error` and detached.
    fn subscribe(
        &mut self,
        on_update: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Result<SubscriptionId, StorageError>;

    /// Stop delivery. Writes already issued are unaffected.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    fn add(&mut self, guest: &NewGuest) -> Result<GuestId, StorageError>;

    /// Merge only the patched fields into the document.
    fn update(&mut self, id: GuestId, patch: &GuestPatch) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] when the document is already gone.
    fn remove(&mut self, id: GuestId) -> Result<(), StorageError>;

    /// Drop and re-establish the live connection. Single attempt, no backoff.
    fn force_reconnect(&mut self) -> Result<(), StorageError>;

    /// Create all guests in one transaction.
    fn add_batch(&mut self, guests: &[NewGuest]) -> Result<Vec<GuestId>, StorageError>;

    /// Clear `alreadySpoke` and `confirmationStatus` on every id in one transaction.
    fn reset_statuses(&mut self, ids: &[GuestId]) -> Result<(), StorageError>;
}
