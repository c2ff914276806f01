//! Index error types

use thiserror::Error;

/// Errors raised by the key index and the secondary index manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Insert of an `_id` that already holds a live document
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Query against an index that was never registered
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// `create_index` with a name already in use
    #[error("index already exists: {0}")]
    AlreadyExists(String),

    /// Query against an index whose back-fill has not finished
    #[error("index is still building: {0}")]
    Building(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
