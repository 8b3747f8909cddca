use guestlist_core::{ConfirmationStatus, GuestField, GuestId, GuestPatch, GuestRecord};
use guestlist_storage::{GuestStore, StorageError};
use tracing::{debug, warn};

use crate::buffer::{FieldBuffer, RowBuffers};
use crate::config::{BoardConfig, ReseedPolicy};
use crate::error::EngineError;
use crate::reconcile::{Reconciliation, reconcile_row};
use crate::save_state::{CommitTicket, SaveState, SaveStateMachine};

/// A write the row has started but not yet seen resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub id: GuestId,
    pub ticket: CommitTicket,
    pub patch: GuestPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing differed from the authoritative value; no write was issued.
    Skipped,
    Saved,
    Failed,
    /// The row was torn down before the write resolved.
    Detached,
}

/// Editing state of one displayed guest: the authoritative record, a draft
/// per text field and the row's save state.
#[derive(Debug)]
pub struct GuestRow {
    record: GuestRecord,
    buffers: RowBuffers,
    save: SaveStateMachine,
    reseed: ReseedPolicy,
}

impl GuestRow {
    pub fn new(record: GuestRecord, config: &BoardConfig) -> Self {
        Self {
            buffers: RowBuffers::seeded(&record),
            record,
            save: SaveStateMachine::new(config),
            reseed: config.reseed,
        }
    }

    pub fn id(&self) -> GuestId {
        self.record.id
    }

    pub fn record(&self) -> &GuestRecord {
        &self.record
    }

    pub fn save_state(&self) -> SaveState {
        self.save.state()
    }

    pub fn save_machine(&self) -> &SaveStateMachine {
        &self.save
    }

    pub fn buffer(&self, field: GuestField) -> Option<&FieldBuffer> {
        self.buffers.get(field)
    }

    pub fn draft(&self, field: GuestField) -> Option<&str> {
        self.buffers.get(field).map(FieldBuffer::draft)
    }

    pub fn drifted_fields(&self) -> Vec<GuestField> {
        self.buffers.drifted()
    }

    pub fn is_disposed(&self) -> bool {
        self.save.is_disposed()
    }

    /// Take a fresh authoritative record and reconcile the drafts against it.
    pub fn apply_record(&mut self, record: GuestRecord) -> Vec<(GuestField, Reconciliation)> {
        if self.is_disposed() {
            return Vec::new();
        }
        let changed = reconcile_row(&mut self.buffers, &record, self.reseed);
        self.record = record;
        changed
    }

    pub fn focus(&mut self, field: GuestField) -> Result<(), EngineError> {
        self.buffer_mut(field)?.focus();
        Ok(())
    }

    pub fn edit(&mut self, field: GuestField, value: impl Into<String>) -> Result<(), EngineError> {
        self.buffer_mut(field)?.edit(value);
        Ok(())
    }

    /// Leave a text field. Returns the commit to send when the draft differs
    /// from the authoritative value.
    pub fn blur(&mut self, field: GuestField) -> Result<Option<PendingCommit>, EngineError> {
        let id = self.record.id;
        let authoritative = self.record.text(field).unwrap_or_default().to_string();
        let buffer = self.buffer_mut(field)?;
        buffer.blur();
        buffer.clear_drift();
        if !buffer.is_dirty(&authoritative) {
            debug!(guest = %id, field = %field, "draft unchanged, skipping write");
            return Ok(None);
        }
        let patch = GuestPatch::single(field, buffer.draft());
        self.start(patch).map(Some)
    }

    pub fn toggle_already_spoke(&mut self, value: bool) -> Result<Option<PendingCommit>, EngineError> {
        self.ensure_live()?;
        if self.record.already_spoke == value {
            return Ok(None);
        }
        self.start(GuestPatch::single(GuestField::AlreadySpoke, value))
            .map(Some)
    }

    pub fn choose_status(
        &mut self,
        status: ConfirmationStatus,
    ) -> Result<Option<PendingCommit>, EngineError> {
        self.ensure_live()?;
        if self.record.confirmation_status == status {
            return Ok(None);
        }
        self.start(GuestPatch::single(GuestField::ConfirmationStatus, status.as_str()))
            .map(Some)
    }

    /// Feed back the store's answer for a commit. Failures stop here: they
    /// become the row's error state and are not returned to the caller.
    pub fn complete(
        &mut self,
        pending: &PendingCommit,
        result: Result<(), StorageError>,
        now: u64,
    ) -> CommitOutcome {
        if self.is_disposed() {
            debug!(guest = %pending.id, "commit resolved after row teardown");
            return CommitOutcome::Detached;
        }
        match result {
            Ok(()) => {
                self.save.resolve(pending.ticket, true, now);
                CommitOutcome::Saved
            }
            Err(err) => {
                warn!(guest = %pending.id, error = %err, "commit failed");
                self.save.resolve(pending.ticket, false, now);
                CommitOutcome::Failed
            }
        }
    }

    pub fn commit_blur(
        &mut self,
        store: &mut dyn GuestStore,
        field: GuestField,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        let pending = self.blur(field)?;
        Ok(self.send(store, pending, now))
    }

    pub fn commit_already_spoke(
        &mut self,
        store: &mut dyn GuestStore,
        value: bool,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        let pending = self.toggle_already_spoke(value)?;
        Ok(self.send(store, pending, now))
    }

    pub fn commit_status(
        &mut self,
        store: &mut dyn GuestStore,
        status: ConfirmationStatus,
        now: u64,
    ) -> Result<CommitOutcome, EngineError> {
        let pending = self.choose_status(status)?;
        Ok(self.send(store, pending, now))
    }

    pub fn tick(&mut self, now: u64) -> bool {
        self.save.tick(now)
    }

    pub fn dispose(&mut self) {
        self.save.dispose();
    }

    fn send(
        &mut self,
        store: &mut dyn GuestStore,
        pending: Option<PendingCommit>,
        now: u64,
    ) -> CommitOutcome {
        let Some(pending) = pending else {
            return CommitOutcome::Skipped;
        };
        let result = store.update(pending.id, &pending.patch);
        self.complete(&pending, result, now)
    }

    fn start(&mut self, patch: GuestPatch) -> Result<PendingCommit, EngineError> {
        let ticket = self.save.begin().map_err(|err| match err {
            EngineError::RowDisposed(_) => EngineError::RowDisposed(self.record.id.to_string()),
            EngineError::CommitInFlight(_) => EngineError::CommitInFlight(self.record.id.to_string()),
            other => other,
        })?;
        Ok(PendingCommit {
            id: self.record.id,
            ticket,
            patch,
        })
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.is_disposed() {
            return Err(EngineError::RowDisposed(self.record.id.to_string()));
        }
        Ok(())
    }

    fn buffer_mut(&mut self, field: GuestField) -> Result<&mut FieldBuffer, EngineError> {
        self.ensure_live()?;
        self.buffers
            .get_mut(field)
            .ok_or_else(|| EngineError::NotBuffered(field.key().to_string()))
    }
}
