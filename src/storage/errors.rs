//! Storage tier error types

use std::time::Duration;

use thiserror::Error;

use super::record::{Location, Tier};

/// Errors raised by the storage tier manager and its stores
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Encoded document exceeds the hard maximum
    #[error("document of {size} bytes exceeds maximum of {max} bytes")]
    DocumentTooLarge { size: usize, max: usize },

    /// Store operation exceeded the configured bound; nothing was changed
    #[error("{tier} store {operation} exceeded bound of {bound:?}")]
    Timeout {
        tier: Tier,
        operation: &'static str,
        bound: Duration,
    },

    /// A record points at a slot that holds no payload
    #[error("no payload at {0}")]
    MissingPayload(Location),
}

impl StorageError {
    /// Missing payloads mean the record table and stores disagree
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::MissingPayload(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
