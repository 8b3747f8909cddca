use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid field value for {field}: expected {expected}")]
    FieldKindMismatch { field: &'static str, expected: &'static str },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
