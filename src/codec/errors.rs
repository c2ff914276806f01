//! Codec error types

use thiserror::Error;

/// Errors raised while encoding or decoding documents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value cannot be represented (non-finite number, oversize length,
    /// malformed document shape)
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The byte payload is not a valid encoding (checksum, truncation,
    /// unknown tag, invalid UTF-8)
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),
}

impl CodecError {
    /// Corruption means stored data can no longer be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, CodecError::CorruptPayload(_))
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
