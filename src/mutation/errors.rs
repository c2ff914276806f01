//! Mutation error types

use thiserror::Error;

use crate::document::PathError;

/// Reasons a mutation is rejected before anything is applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// The mutation would change or remove `_id`
    #[error("immutable key: {0} cannot be changed")]
    ImmutableKey(String),

    /// APPEND/PREPEND target exists but is not an array
    #[error("not an array at {path}: found {found}")]
    NotAnArray { path: String, found: &'static str },

    /// Structurally invalid request (non-object patch, root target,
    /// non-numeric increment, out-of-range index)
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

/// Result type for mutation operations
pub type MutationResult<T> = Result<T, MutationError>;
