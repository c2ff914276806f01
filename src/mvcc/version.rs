//! Version - one immutable state of a document key
//!
//! Updates create new versions; deletes are explicit tombstones.

use crate::storage::StorageRecord;

use super::CommitId;

/// Either a stored payload or an explicit deletion marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionPayload {
    Record(StorageRecord),
    Tombstone,
}

impl VersionPayload {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    #[inline]
    pub fn record(&self) -> Option<&StorageRecord> {
        match self {
            VersionPayload::Record(r) => Some(r),
            VersionPayload::Tombstone => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version {
    commit_id: CommitId,
    payload: VersionPayload,
}

impl Version {
    pub fn new(commit_id: CommitId, payload: VersionPayload) -> Self {
        Self { commit_id, payload }
    }

    pub fn record(commit_id: CommitId, record: StorageRecord) -> Self {
        Self::new(commit_id, VersionPayload::Record(record))
    }

    pub fn tombstone(commit_id: CommitId) -> Self {
        Self::new(commit_id, VersionPayload::Tombstone)
    }

    #[inline]
    pub fn commit_id(&self) -> CommitId {
        self.commit_id
    }

    #[inline]
    pub fn payload(&self) -> &VersionPayload {
        &self.payload
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }
}
