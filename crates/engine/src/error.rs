use guestlist_core::CoreError;
use guestlist_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("write failed: {0}")]
    Write(#[source] StorageError),

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("row already disposed: {0}")]
    RowDisposed(String),

    #[error("field has no edit buffer: {0}")]
    NotBuffered(String),

    #[error("commit already in flight for row {0}")]
    CommitInFlight(String),

    #[error("validation failed: {0}")]
    Validation(String),
}
