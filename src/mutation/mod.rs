//! Mutation engine
//!
//! - Merge-patch: recursive object merge where `null` removes
//! - Path-transform: ordered set/remove/append/prepend/rename/increment
//! - Replace: whole-body swap with `_id` preserved
//!
//! All modes produce a new body from the current one; the engine then
//! stores, indexes and commits it as one unit.

mod engine;
mod errors;
mod merge_patch;
mod transform;

pub use engine::{Mutation, MutationState, MutationTrace, UpdateOutcome};
pub(crate) use engine::{record_rejection, MutationEngine};
pub use errors::{MutationError, MutationResult};
pub use merge_patch::{apply_merge_patch, merge_patch};
pub use transform::{apply_transform, PathOp};
