pub mod aggregate;
pub mod buffer;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod row;
pub mod save_state;
pub mod timer;

pub use aggregate::{FrameworkFilter, GuestListView, GuestStats, ListFilter, StatusFilter};
pub use buffer::{FieldBuffer, RowBuffers};
pub use config::{BoardConfig, OverlapPolicy, ReseedPolicy};
pub use error::EngineError;
pub use reconcile::{Reconciliation, reconcile_field, reconcile_row};
pub use row::{CommitOutcome, GuestRow, PendingCommit};
pub use save_state::{CommitTicket, SaveState, SaveStateMachine};
pub use timer::{Timeout, TimeoutSlot, TimeoutToken};

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use guestlist_core::{ConfirmationStatus, GuestField, GuestId, NewGuest, SubscriptionId};
use guestlist_storage::{GuestStore, Snapshot, StorageError};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardStatus {
    /// Subscribed, first snapshot not yet seen.
    Loading,
    Live,
    /// The listener failed to attach or was dropped. Cleared by `refresh`.
    Failed(String),
}

#[derive(Debug)]
enum BoardEvent {
    Snapshot(Snapshot),
    Failed(String),
}

type Inbox = Rc<RefCell<VecDeque<BoardEvent>>>;

/// Form input for a new guest. Blank `row_number` takes the next free one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestDraft {
    pub row_number: Option<i64>,
    pub name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub framework: String,
    pub responsibility: String,
    pub notes: String,
}

/// One client's live view of the guest list.
///
/// Store callbacks only queue events; [`GuestBoard::pump`] applies them, so
/// the board never re-enters itself from inside a store call. The store is
/// passed to each operation rather than owned, so several boards can share
/// one store.
pub struct GuestBoard {
    config: BoardConfig,
    inbox: Inbox,
    subscription: Option<SubscriptionId>,
    status: BoardStatus,
    offline: bool,
    last_synced: Option<u64>,
    filter: ListFilter,
    view: GuestListView,
    rows: BTreeMap<GuestId, GuestRow>,
}

impl GuestBoard {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            subscription: None,
            status: BoardStatus::Loading,
            offline: false,
            last_synced: None,
            filter: ListFilter::default(),
            view: GuestListView::default(),
            rows: BTreeMap::new(),
        }
    }

    pub fn status(&self) -> &BoardStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == BoardStatus::Loading
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Time of the last snapshot confirmed by the server.
    pub fn last_synced(&self) -> Option<u64> {
        self.last_synced
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn view(&self) -> &GuestListView {
        &self.view
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn stats(&self) -> &GuestStats {
        self.view.stats()
    }

    pub fn row(&self, id: GuestId) -> Option<&GuestRow> {
        self.rows.get(&id)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Start listening. The initial snapshot is queued, not yet applied.
    pub fn attach(&mut self, store: &mut dyn GuestStore) -> Result<(), EngineError> {
        self.detach(store);
        self.inbox.borrow_mut().clear();
        self.status = BoardStatus::Loading;

        let updates = Rc::clone(&self.inbox);
        let failures = Rc::clone(&self.inbox);
        let attached = store.subscribe(
            Box::new(move |snapshot| {
                updates
                    .borrow_mut()
                    .push_back(BoardEvent::Snapshot(snapshot.clone()));
            }),
            Box::new(move |err| {
                failures
                    .borrow_mut()
                    .push_back(BoardEvent::Failed(err.to_string()));
            }),
        );

        match attached {
            Ok(id) => {
                info!(subscription = %id, "board attached");
                self.subscription = Some(id);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "subscription failed to attach");
                self.status = BoardStatus::Failed(err.to_string());
                Err(EngineError::Subscription(err.to_string()))
            }
        }
    }

    pub fn detach(&mut self, store: &mut dyn GuestStore) {
        if let Some(id) = self.subscription.take() {
            store.unsubscribe(id);
            debug!(subscription = %id, "board detached");
        }
    }

    /// Apply every queued store event. Returns how many were applied.
    pub fn pump(&mut self, now: u64) -> usize {
        let events: Vec<BoardEvent> = self.inbox.borrow_mut().drain(..).collect();
        let applied = events.len();
        for event in events {
            match event {
                BoardEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot, now),
                BoardEvent::Failed(reason) => {
                    error!(%reason, "subscription dropped");
                    self.subscription = None;
                    self.status = BoardStatus::Failed(reason);
                }
            }
        }
        applied
    }

    /// Manual recovery: one disable/enable cycle on the connection, then the
    /// listener is replaced, stuck or not. A failed reconnect only shows as
    /// offline and is reported as `Ok(false)`.
    pub fn refresh(&mut self, store: &mut dyn GuestStore, now: u64) -> Result<bool, EngineError> {
        self.pump(now);
        if let Err(err) = store.force_reconnect() {
            error!(error = %err, "reconnect failed");
            self.offline = true;
            return Ok(false);
        }
        self.attach(store)?;
        Ok(true)
    }

    pub fn set_filter(&mut self, filter: ListFilter) {
        self.filter = filter;
        self.view.refilter(&self.filter);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
        self.view.refilter(&self.filter);
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
        self.view.refilter(&self.filter);
    }

    pub fn set_framework_filter(&mut self, framework: FrameworkFilter) {
        self.filter.framework = framework;
        self.view.refilter(&self.filter);
    }

    pub fn focus(&mut self, id: GuestId, field: GuestField) -> Result<(), EngineError> {
        self.row_mut(id)?.focus(field)
    }

    pub fn edit(
        &mut self,
        id: GuestId,
        field: GuestField,
        value: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.row_mut(id)?.edit(field, value)
    }

    pub fn blur(
        &mut self,
        store: &mut dyn GuestStore,
        id: GuestId,
        field: GuestField,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        self.row_mut(id)?.commit_blur(store, field, now)
    }

    pub fn set_already_spoke(
        &mut self,
        store: &mut dyn GuestStore,
        id: GuestId,
        value: bool,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        self.row_mut(id)?.commit_already_spoke(store, value, now)
    }

    pub fn set_status(
        &mut self,
        store: &mut dyn GuestStore,
        id: GuestId,
        status: ConfirmationStatus,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        self.row_mut(id)?.commit_status(store, status, now)
    }

    /// Blur without writing: the caller sends the returned commit itself and
    /// hands the result to [`GuestBoard::complete`].
    pub fn prepare_blur(
        &mut self,
        id: GuestId,
        field: GuestField,
    ) -> Result<Option<PendingCommit>, EngineError> {
        self.row_mut(id)?.blur(field)
    }

    pub fn prepare_already_spoke(
        &mut self,
        id: GuestId,
        value: bool,
    ) -> Result<Option<PendingCommit>, EngineError> {
        self.row_mut(id)?.toggle_already_spoke(value)
    }

    pub fn prepare_status(
        &mut self,
        id: GuestId,
        status: ConfirmationStatus,
    ) -> Result<Option<PendingCommit>, EngineError> {
        self.row_mut(id)?.choose_status(status)
    }

    /// Resolve a prepared commit. A row that has since left the list reports
    /// [`CommitOutcome::Detached`] and nothing is touched.
    pub fn complete(
        &mut self,
        pending: &PendingCommit,
        result: Result<(), StorageError>,
        now: u64,
    ) -> CommitOutcome {
        match self.rows.get_mut(&pending.id) {
            Some(row) => row.complete(pending, result, now),
            None => {
                debug!(guest = %pending.id, "commit resolved for a row no longer shown");
                CommitOutcome::Detached
            }
        }
    }

    pub fn add_guest(
        &mut self,
        store: &mut dyn GuestStore,
        draft: &GuestDraft,
    ) -> Result<GuestId, EngineError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("name is required".into()));
        }
        let row_number = match draft.row_number {
            Some(row_number) => row_number,
            None => self.view.next_row_number().ok_or_else(|| {
                EngineError::Validation("no row number left after the highest one".into())
            })?,
        };
        let guest = NewGuest {
            row_number,
            name: name.to_string(),
            phone: draft.phone.trim().to_string(),
            age: draft.age.trim().to_string(),
            gender: draft.gender.trim().to_string(),
            framework: draft.framework.trim().to_string(),
            responsibility: draft.responsibility.trim().to_string(),
            notes: draft.notes.trim().to_string(),
            ..NewGuest::default()
        };
        let id = store.add(&guest).map_err(EngineError::Write)?;
        info!(guest = %id, row = guest.row_number, "guest added");
        Ok(id)
    }

    /// Delete a guest. A guest that is already gone counts as deleted.
    pub fn delete_guest(&mut self, store: &mut dyn GuestStore, id: GuestId) -> Result<(), EngineError> {
        match store.remove(id) {
            Ok(()) => {
                info!(guest = %id, "guest deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(guest = %id, "guest already deleted");
                Ok(())
            }
            Err(err) => Err(EngineError::Write(err)),
        }
    }

    /// Clear the spoke flag and status on every guest in the current snapshot.
    pub fn reset_all(&mut self, store: &mut dyn GuestStore) -> Result<usize, EngineError> {
        let ids: Vec<GuestId> = self.view.records().iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        store.reset_statuses(&ids).map_err(EngineError::Write)?;
        info!(count = ids.len(), "statuses reset");
        Ok(ids.len())
    }

    /// Advance row timers. Returns how many rows fell back to idle.
    pub fn tick(&mut self, now: u64) -> usize {
        self.rows
            .values_mut()
            .map(|row| row.tick(now))
            .filter(|fired| *fired)
            .count()
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot, now: u64) {
        debug!(
            sequence = snapshot.sequence,
            records = snapshot.records.len(),
            from_cache = snapshot.from_cache,
            "snapshot applied"
        );
        self.status = BoardStatus::Live;
        self.offline = snapshot.from_cache;
        if !snapshot.from_cache {
            self.last_synced = Some(now);
        }

        let mut rows = BTreeMap::new();
        for record in &snapshot.records {
            let row = match self.rows.remove(&record.id) {
                Some(mut row) => {
                    row.apply_record(record.clone());
                    row
                }
                None => GuestRow::new(record.clone(), &self.config),
            };
            rows.insert(record.id, row);
        }
        for (id, mut gone) in std::mem::replace(&mut self.rows, rows) {
            debug!(guest = %id, "row torn down");
            gone.dispose();
        }

        self.view = GuestListView::build(snapshot.records, &self.filter);
    }

    fn row_mut(&mut self, id: GuestId) -> Result<&mut GuestRow, EngineError> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| EngineError::RowNotFound(id.to_string()))
    }
}
