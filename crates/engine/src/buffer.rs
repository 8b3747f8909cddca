use std::collections::BTreeMap;

use guestlist_core::{GuestField, GuestRecord};

/// Local draft of one text field, held apart from the authoritative record
/// until it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBuffer {
    draft: String,
    /// Authoritative value the draft was last reconciled against.
    seen: String,
    focused: bool,
    drifted: bool,
}

impl FieldBuffer {
    pub fn seeded(authoritative: &str) -> Self {
        Self {
            draft: authoritative.to_string(),
            seen: authoritative.to_string(),
            focused: false,
            drifted: false,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn seen(&self) -> &str {
        &self.seen
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// The authoritative value changed while this draft was kept.
    pub fn is_drifted(&self) -> bool {
        self.drifted
    }

    pub fn is_dirty(&self, authoritative: &str) -> bool {
        self.draft != authoritative
    }

    pub fn edit(&mut self, value: impl Into<String>) {
        self.draft = value.into();
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Overwrite the draft with a new authoritative value.
    pub fn reseed(&mut self, authoritative: &str) {
        self.draft = authoritative.to_string();
        self.seen = authoritative.to_string();
        self.drifted = false;
    }

    /// Accept a new authoritative value without touching the draft.
    pub fn mark_drifted(&mut self, authoritative: &str) {
        self.seen = authoritative.to_string();
        self.drifted = true;
    }

    pub fn clear_drift(&mut self) {
        self.drifted = false;
    }
}

/// One buffer per editable text field of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBuffers {
    fields: BTreeMap<GuestField, FieldBuffer>,
}

impl RowBuffers {
    pub fn seeded(record: &GuestRecord) -> Self {
        let fields = GuestField::TEXT
            .into_iter()
            .map(|field| {
                let value = record.text(field).unwrap_or_default();
                (field, FieldBuffer::seeded(value))
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: GuestField) -> Option<&FieldBuffer> {
        self.fields.get(&field)
    }

    pub fn get_mut(&mut self, field: GuestField) -> Option<&mut FieldBuffer> {
        self.fields.get_mut(&field)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&GuestField, &mut FieldBuffer)> {
        self.fields.iter_mut()
    }

    pub fn drifted(&self) -> Vec<GuestField> {
        self.fields
            .iter()
            .filter(|(_, buffer)| buffer.is_drifted())
            .map(|(field, _)| *field)
            .collect()
    }
}
