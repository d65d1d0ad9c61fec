//! Error types for the Spacehub state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The stored version moved on since the caller read the record.
    #[error("concurrent update: {0}")]
    ConcurrentUpdate(String),

    #[error("already exists: {0}")]
    Duplicate(String),

    #[error("count limit exceeded for {table}: {count} of max {max}")]
    LimitExceeded {
        table: &'static str,
        count: usize,
        max: usize,
    },
}

impl StateError {
    /// True for failures of the backend itself rather than of the request.
    /// A row that no longer decodes is corrupt data, not an outage.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StateError::Open(_)
                | StateError::Transaction(_)
                | StateError::Table(_)
                | StateError::Read(_)
                | StateError::Write(_)
        )
    }
}
