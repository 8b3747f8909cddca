pub mod error;
pub mod field_value;
pub mod guest;
pub mod ids;
pub mod timestamp;

pub use error::CoreError;
pub use field_value::FieldValue;
pub use guest::{ConfirmationStatus, FieldKind, GuestField, GuestPatch, GuestRecord, NewGuest};
pub use ids::*;
pub use timestamp::{ServerClock, Timestamp};
