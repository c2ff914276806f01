//! ReadView - stable snapshot boundary
//!
//! A read view is fixed at read start and never changes: it sees exactly
//! the versions whose commit identity is at or below its upper bound.

use super::CommitId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReadView {
    read_upper_bound: CommitId,
}

impl ReadView {
    #[inline]
    pub fn new(upper_bound: CommitId) -> Self {
        Self {
            read_upper_bound: upper_bound,
        }
    }

    #[inline]
    pub fn upper_bound(&self) -> CommitId {
        self.read_upper_bound
    }

    /// Whether a version committed at `commit_id` is visible
    #[inline]
    pub fn can_see(&self, commit_id: CommitId) -> bool {
        commit_id <= self.read_upper_bound
    }
}
