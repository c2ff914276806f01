//! Top-level error type
//!
//! Every public collection operation returns [`Error`]. Subsystem errors
//! convert with `?`; `code()` gives the stable identifier surfaced by the
//! shell.

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::document::PathError;
use crate::index::IndexError;
use crate::mutation::MutationError;
use crate::observability::Severity;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum Error {
    /// Insert of an `_id` already held by a live document
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// No live document with this `_id`
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("unknown index: {0}")]
    UnknownIndex(String),

    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("index is still building: {0}")]
    IndexBuilding(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DuplicateKey(id) => Error::DuplicateKey(id),
            IndexError::UnknownIndex(name) => Error::UnknownIndex(name),
            IndexError::AlreadyExists(name) => Error::IndexAlreadyExists(name),
            IndexError::Building(name) => Error::IndexBuilding(name),
        }
    }
}

impl From<PathError> for Error {
    fn from(err: PathError) -> Self {
        Error::Mutation(MutationError::InvalidPath(err))
    }
}

impl Error {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::DuplicateKey(_) => "DOCVAULT_DUPLICATE_KEY",
            Error::NotFound(_) => "DOCVAULT_NOT_FOUND",
            Error::UnknownIndex(_) => "DOCVAULT_UNKNOWN_INDEX",
            Error::IndexAlreadyExists(_) => "DOCVAULT_INDEX_EXISTS",
            Error::IndexBuilding(_) => "DOCVAULT_INDEX_BUILDING",
            Error::Codec(CodecError::Encoding(_)) => "DOCVAULT_ENCODING_ERROR",
            Error::Codec(CodecError::CorruptPayload(_)) => "DOCVAULT_CORRUPT_PAYLOAD",
            Error::Storage(StorageError::DocumentTooLarge { .. }) => "DOCVAULT_DOCUMENT_TOO_LARGE",
            Error::Storage(StorageError::Timeout { .. }) => "DOCVAULT_STORAGE_TIMEOUT",
            Error::Storage(StorageError::MissingPayload(_)) => "DOCVAULT_CORRUPT_PAYLOAD",
            Error::Mutation(MutationError::ImmutableKey(_)) => "DOCVAULT_IMMUTABLE_KEY",
            Error::Mutation(MutationError::NotAnArray { .. }) => "DOCVAULT_NOT_AN_ARRAY",
            Error::Mutation(MutationError::InvalidMutation(_)) => "DOCVAULT_INVALID_MUTATION",
            Error::Mutation(MutationError::InvalidPath(_)) => "DOCVAULT_INVALID_PATH",
            Error::Config(_) => "DOCVAULT_CONFIG_ERROR",
        }
    }

    /// Corruption is fatal; everything else fails only the operation
    pub fn severity(&self) -> Severity {
        if self.is_corruption() {
            Severity::Fatal
        } else {
            Severity::Error
        }
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::DuplicateKey(_) | Error::IndexBuilding(_) | Error::Storage(StorageError::Timeout { .. })
        )
    }

    /// Stored bytes can no longer be trusted
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Codec(e) => e.is_corruption(),
            Error::Storage(e) => e.is_corruption(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for collection operations
pub type Result<T> = std::result::Result<T, Error>;
