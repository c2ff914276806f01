//! VersionChain - version history of one document key
//!
//! Versions are kept in ascending commit order. Visibility picks the newest
//! version at or below the view bound; a tombstone there means "absent".

use crate::storage::StorageRecord;

use super::{CommitId, ReadView, Version, VersionPayload};

#[derive(Clone, Debug, Default)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Append a version. Commit identities must be strictly increasing.
    pub fn push(&mut self, version: Version) {
        debug_assert!(self
            .versions
            .last()
            .map_or(true, |last| last.commit_id() < version.commit_id()));
        self.versions.push(version);
    }

    /// Newest version regardless of visibility
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Record of the newest committed version, `None` if deleted
    pub fn latest_record(&self) -> Option<&StorageRecord> {
        self.latest().and_then(|v| v.payload().record())
    }

    /// Record visible to `view`, `None` if absent or deleted at that point
    pub fn visible(&self, view: ReadView) -> Option<&StorageRecord> {
        self.versions
            .iter()
            .rev()
            .find(|v| view.can_see(v.commit_id()))
            .and_then(|v| v.payload().record())
    }

    /// Drop versions no view at or above `floor` can observe.
    ///
    /// The newest version with commit id <= `floor` stays (it is what a
    /// view at the floor sees); everything older goes. A chain whose only
    /// survivor is a tombstone at or below the floor is emptied entirely.
    /// Returns the storage records of the dropped versions.
    pub fn prune(&mut self, floor: CommitId) -> Vec<StorageRecord> {
        let Some(keep_from) = self
            .versions
            .iter()
            .rposition(|v| v.commit_id() <= floor)
        else {
            return Vec::new();
        };

        let mut dropped: Vec<Version> = self.versions.drain(..keep_from).collect();
        if self.versions.len() == 1 && self.versions[0].is_tombstone() {
            dropped.extend(self.versions.drain(..));
        }

        dropped
            .into_iter()
            .filter_map(|v| match v.payload() {
                VersionPayload::Record(r) => Some(*r),
                VersionPayload::Tombstone => None,
            })
            .collect()
    }
}
