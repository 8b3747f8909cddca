pub mod error;
pub mod import;
pub mod schema;
pub mod sqlite;
pub mod subscriptions;
pub mod traits;

pub use error::StorageError;
pub use import::{ImportOptions, ImportReport, ParsedCsv, import_guests, parse_guest_csv};
pub use sqlite::SqliteStore;
pub use subscriptions::SubscriptionRegistry;
pub use traits::*;
