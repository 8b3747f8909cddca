use guestlist_core::{GuestField, GuestRecord};
use tracing::debug;

use crate::buffer::{FieldBuffer, RowBuffers};
use crate::config::ReseedPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The authoritative value did not move; the draft is left alone.
    Unchanged,
    /// The draft was overwritten with the new authoritative value.
    Reseeded,
    /// A focused, modified draft was kept and flagged as drifted.
    Preserved,
}

/// Decide what an incoming authoritative value does to a field's draft.
///
/// Under [`ReseedPolicy::Always`] any change of the authoritative value
/// overwrites the draft, including an in-progress edit. Under
/// [`ReseedPolicy::PreserveFocused`] a focused draft that differs from the
/// value it was seeded with survives.
pub fn reconcile_field(
    buffer: &mut FieldBuffer,
    authoritative: &str,
    policy: ReseedPolicy,
) -> Reconciliation {
    if buffer.seen() == authoritative {
        return Reconciliation::Unchanged;
    }

    let editing = buffer.is_focused() && buffer.is_dirty(buffer.seen());
    match policy {
        ReseedPolicy::PreserveFocused if editing => {
            buffer.mark_drifted(authoritative);
            Reconciliation::Preserved
        }
        _ => {
            buffer.reseed(authoritative);
            Reconciliation::Reseeded
        }
    }
}

/// Reconcile every text buffer of a row against a fresh record.
pub fn reconcile_row(
    buffers: &mut RowBuffers,
    record: &GuestRecord,
    policy: ReseedPolicy,
) -> Vec<(GuestField, Reconciliation)> {
    let mut changed = Vec::new();
    for (field, buffer) in buffers.iter_mut() {
        let authoritative = record.text(*field).unwrap_or_default();
        let outcome = reconcile_field(buffer, authoritative, policy);
        if outcome != Reconciliation::Unchanged {
            debug!(guest = %record.id, field = %field, ?outcome, "buffer reconciled");
            changed.push((*field, outcome));
        }
    }
    changed
}
