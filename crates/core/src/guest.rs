use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::ids::GuestId;
use crate::timestamp::Timestamp;

/// Name of the collection holding one document per guest.
pub const GUESTS_COLLECTION: &str = "guests";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    #[default]
    NotYetHandled,
    Confirmed,
    Declined,
    Maybe,
    NoAnswer,
}

impl ConfirmationStatus {
    /// Display order used by status pickers.
    pub const ALL: [ConfirmationStatus; 5] = [
        Self::NotYetHandled,
        Self::Confirmed,
        Self::Declined,
        Self::Maybe,
        Self::NoAnswer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotYetHandled => "not_yet_handled",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
            Self::Maybe => "maybe",
            Self::NoAnswer => "no_answer",
        }
    }

    /// The label shown to staff. Older documents store this label verbatim.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotYetHandled => "טרם טופל",
            Self::Confirmed => "נרשם",
            Self::Declined => "לא נרשם",
            Self::Maybe => "אולי",
            Self::NoAnswer => "לא ענה",
        }
    }

    /// Accepts either the stable key or the display label.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s || status.label() == s)
            .ok_or_else(|| CoreError::InvalidData(format!("unknown confirmation status: {s}")))
    }

    /// Unknown or missing values read as not-yet-handled.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    Toggle,
    Choice,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Toggle => "boolean",
            Self::Choice => "confirmation status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GuestField {
    RowNumber,
    Name,
    Phone,
    Age,
    Gender,
    Framework,
    Responsibility,
    Notes,
    AlreadySpoke,
    ConfirmationStatus,
    HandledBy,
}

impl GuestField {
    pub const ALL: [GuestField; 11] = [
        Self::RowNumber,
        Self::Name,
        Self::Phone,
        Self::Age,
        Self::Gender,
        Self::Framework,
        Self::Responsibility,
        Self::Notes,
        Self::AlreadySpoke,
        Self::ConfirmationStatus,
        Self::HandledBy,
    ];

    /// Free-text fields; each gets its own edit buffer on a row.
    pub const TEXT: [GuestField; 8] = [
        Self::Name,
        Self::Phone,
        Self::Age,
        Self::Gender,
        Self::Framework,
        Self::Responsibility,
        Self::Notes,
        Self::HandledBy,
    ];

    /// Document key, as written by every client of the collection.
    pub fn key(&self) -> &'static str {
        match self {
            Self::RowNumber => "rowNumber",
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Framework => "framework",
            Self::Responsibility => "responsibility",
            Self::Notes => "notes",
            Self::AlreadySpoke => "alreadySpoke",
            Self::ConfirmationStatus => "confirmationStatus",
            Self::HandledBy => "handledBy",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| CoreError::UnknownField(key.to_string()))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::RowNumber => FieldKind::Integer,
            Self::AlreadySpoke => FieldKind::Toggle,
            Self::ConfirmationStatus => FieldKind::Choice,
            _ => FieldKind::Text,
        }
    }

    /// Advisory shape check; the store itself accepts anything.
    pub fn check(&self, value: &FieldValue) -> Result<(), CoreError> {
        let ok = match (self.kind(), value) {
            (FieldKind::Integer, FieldValue::Integer(_)) => true,
            (FieldKind::Text, FieldValue::Text(_)) => true,
            (FieldKind::Toggle, FieldValue::Boolean(_)) => true,
            (FieldKind::Choice, FieldValue::Text(s)) => ConfirmationStatus::parse(s).is_ok(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::FieldKindMismatch {
                field: self.key(),
                expected: self.kind().expected(),
            })
        }
    }
}

impl fmt::Display for GuestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A guest as last delivered by the store's subscription stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub id: GuestId,
    pub row_number: i64,
    pub name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub framework: String,
    pub responsibility: String,
    pub notes: String,
    pub already_spoke: bool,
    pub confirmation_status: ConfirmationStatus,
    pub handled_by: String,
    pub last_updated: Timestamp,
}

impl GuestRecord {
    /// Decode a stored document. Missing or mistyped fields take their
    /// defaults; unknown keys are ignored.
    pub fn from_fields<I>(id: GuestId, last_updated: Timestamp, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut record = Self {
            id,
            row_number: 0,
            name: String::new(),
            phone: String::new(),
            age: String::new(),
            gender: String::new(),
            framework: String::new(),
            responsibility: String::new(),
            notes: String::new(),
            already_spoke: false,
            confirmation_status: ConfirmationStatus::default(),
            handled_by: String::new(),
            last_updated,
        };

        for (key, value) in fields {
            let Ok(field) = GuestField::from_key(&key) else {
                continue;
            };
            match (field, value) {
                (GuestField::RowNumber, FieldValue::Integer(n)) => record.row_number = n,
                (GuestField::RowNumber, FieldValue::Text(s)) => {
                    record.row_number = s.trim().parse().unwrap_or(0);
                }
                (GuestField::AlreadySpoke, FieldValue::Boolean(b)) => record.already_spoke = b,
                (GuestField::ConfirmationStatus, FieldValue::Text(s)) => {
                    record.confirmation_status = ConfirmationStatus::parse_or_default(&s);
                }
                (field, FieldValue::Text(s)) => {
                    if let Some(slot) = record.text_mut(field) {
                        *slot = s;
                    }
                }
                _ => {}
            }
        }
        record
    }

    pub fn text(&self, field: GuestField) -> Option<&str> {
        let s = match field {
            GuestField::Name => &self.name,
            GuestField::Phone => &self.phone,
            GuestField::Age => &self.age,
            GuestField::Gender => &self.gender,
            GuestField::Framework => &self.framework,
            GuestField::Responsibility => &self.responsibility,
            GuestField::Notes => &self.notes,
            GuestField::HandledBy => &self.handled_by,
            _ => return None,
        };
        Some(s.as_str())
    }

    fn text_mut(&mut self, field: GuestField) -> Option<&mut String> {
        match field {
            GuestField::Name => Some(&mut self.name),
            GuestField::Phone => Some(&mut self.phone),
            GuestField::Age => Some(&mut self.age),
            GuestField::Gender => Some(&mut self.gender),
            GuestField::Framework => Some(&mut self.framework),
            GuestField::Responsibility => Some(&mut self.responsibility),
            GuestField::Notes => Some(&mut self.notes),
            GuestField::HandledBy => Some(&mut self.handled_by),
            _ => None,
        }
    }
}

/// Field set for a guest that has not been written yet (no id, no stamp).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGuest {
    pub row_number: i64,
    pub name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub framework: String,
    pub responsibility: String,
    pub notes: String,
    pub already_spoke: bool,
    pub confirmation_status: ConfirmationStatus,
    pub handled_by: String,
}

impl NewGuest {
    pub fn new(row_number: i64, name: impl Into<String>) -> Self {
        Self {
            row_number,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn to_fields(&self) -> Vec<(GuestField, FieldValue)> {
        vec![
            (GuestField::RowNumber, FieldValue::Integer(self.row_number)),
            (GuestField::Name, self.name.as_str().into()),
            (GuestField::Phone, self.phone.as_str().into()),
            (GuestField::Age, self.age.as_str().into()),
            (GuestField::Gender, self.gender.as_str().into()),
            (GuestField::Framework, self.framework.as_str().into()),
            (GuestField::Responsibility, self.responsibility.as_str().into()),
            (GuestField::Notes, self.notes.as_str().into()),
            (GuestField::AlreadySpoke, FieldValue::Boolean(self.already_spoke)),
            (
                GuestField::ConfirmationStatus,
                self.confirmation_status.as_str().into(),
            ),
            (GuestField::HandledBy, self.handled_by.as_str().into()),
        ]
    }
}

/// A partial update: only the listed fields are merged into the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestPatch {
    entries: Vec<(GuestField, FieldValue)>,
}

impl GuestPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: GuestField, value: impl Into<FieldValue>) -> Self {
        Self::new().set(field, value)
    }

    /// Status fields cleared back to their defaults.
    pub fn reset_status() -> Self {
        Self::new()
            .set(GuestField::AlreadySpoke, false)
            .set(
                GuestField::ConfirmationStatus,
                ConfirmationStatus::NotYetHandled.as_str(),
            )
    }

    pub fn set(mut self, field: GuestField, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: GuestField, value: FieldValue) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: GuestField) -> Option<&FieldValue> {
        self.entries.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(GuestField, FieldValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entries.is_empty() {
            return Err(CoreError::InvalidOperation("empty patch".into()));
        }
        for (field, value) in &self.entries {
            field.check(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_key_and_label() {
        for status in ConfirmationStatus::ALL {
            assert_eq!(ConfirmationStatus::parse(status.as_str()).unwrap(), status);
            assert_eq!(ConfirmationStatus::parse(status.label()).unwrap(), status);
        }
        assert_eq!(
            ConfirmationStatus::parse_or_default("something else"),
            ConfirmationStatus::NotYetHandled
        );
    }

    #[test]
    fn field_keys_are_unique_and_reversible() {
        for field in GuestField::ALL {
            assert_eq!(GuestField::from_key(field.key()).unwrap(), field);
        }
        assert!(matches!(
            GuestField::from_key("lastUpdated"),
            Err(CoreError::UnknownField(_))
        ));
    }

    #[test]
    fn decoding_tolerates_missing_and_mistyped_fields() {
        let id = GuestId::new();
        let record = GuestRecord::from_fields(
            id,
            Timestamp::new(10, 0),
            vec![
                ("name".to_string(), FieldValue::Text("Dana".into())),
                ("rowNumber".to_string(), FieldValue::Text(" 7 ".into())),
                ("alreadySpoke".to_string(), FieldValue::Text("yes".into())),
                ("confirmationStatus".to_string(), FieldValue::Text("נרשם".into())),
                ("color".to_string(), FieldValue::Text("red".into())),
            ],
        );

        assert_eq!(record.id, id);
        assert_eq!(record.name, "Dana");
        assert_eq!(record.row_number, 7);
        assert!(!record.already_spoke);
        assert_eq!(record.confirmation_status, ConfirmationStatus::Confirmed);
        assert_eq!(record.phone, "");
        assert_eq!(record.last_updated, Timestamp::new(10, 0));
    }

    #[test]
    fn patch_set_replaces_previous_value() {
        let patch = GuestPatch::single(GuestField::Name, "a").set(GuestField::Name, "b");
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(GuestField::Name), Some(&FieldValue::Text("b".into())));
    }

    #[test]
    fn patch_validation_checks_field_kinds() {
        assert!(GuestPatch::reset_status().validate().is_ok());
        assert!(GuestPatch::new().validate().is_err());

        let wrong = GuestPatch::single(GuestField::AlreadySpoke, "true");
        assert!(matches!(
            wrong.validate(),
            Err(CoreError::FieldKindMismatch { field: "alreadySpoke", .. })
        ));

        let bad_status = GuestPatch::single(GuestField::ConfirmationStatus, "attending");
        assert!(bad_status.validate().is_err());
    }

    #[test]
    fn new_guest_writes_every_field() {
        let guest = NewGuest::new(4, "Noa");
        let fields = guest.to_fields();
        assert_eq!(fields.len(), GuestField::ALL.len());
        let record = GuestRecord::from_fields(
            GuestId::new(),
            Timestamp::ZERO,
            fields.into_iter().map(|(f, v)| (f.key().to_string(), v)),
        );
        assert_eq!(record.row_number, 4);
        assert_eq!(record.name, "Noa");
        assert_eq!(record.confirmation_status, ConfirmationStatus::NotYetHandled);
    }
}
