//! State store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state database: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    /// Table open, read or write failure inside a transaction.
    #[error("state storage error: {0}")]
    Storage(String),

    #[error("failed to encode scale record: {0}")]
    Encode(String),

    #[error("failed to decode scale record: {0}")]
    Decode(String),

    /// The stored version no longer matches what the writer read.
    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    Conflict {
        key: String,
        expected: Option<u64>,
        found: Option<u64>,
    },
}

impl StateError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::Conflict { .. })
    }
}
