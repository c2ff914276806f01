//! Primary key index
//!
//! Total order over `_id` strings. Each key maps to its version chain, so a
//! read view sees the location that was current at its start. The index
//! imposes no structure on key contents: composite keys such as
//! `CUSTOMER#1#ORDER#7` group purely through lexicographic order.
//!
//! Prefix and interval scans cost `O(log n + k)` and are served lazily in
//! bounded batches; each batch holds the read lock only while it is copied.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::mvcc::{CommitId, ReadView, Version, VersionChain, VersionPayload};
use crate::storage::StorageRecord;

use super::errors::{IndexError, IndexResult};

/// Entries copied out of the tree per lock acquisition
const SCAN_BATCH: usize = 64;

/// A key range to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Every key
    All,
    /// Keys starting with the prefix
    Prefix(String),
    /// Half-open interval `[start, end)`
    Between { start: String, end: String },
}

impl KeyRange {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyRange::Prefix(prefix.into())
    }

    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        KeyRange::Between {
            start: start.into(),
            end: end.into(),
        }
    }

    fn start_bound(&self) -> Bound<String> {
        match self {
            KeyRange::All => Bound::Unbounded,
            KeyRange::Prefix(p) => Bound::Included(p.clone()),
            KeyRange::Between { start, .. } => Bound::Included(start.clone()),
        }
    }

    /// Whether `key` (at or after the start bound) is still inside the range
    fn admits(&self, key: &str) -> bool {
        match self {
            KeyRange::All => true,
            KeyRange::Prefix(p) => key.starts_with(p.as_str()),
            KeyRange::Between { end, .. } => key < end.as_str(),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, KeyRange::Between { start, end } if start >= end)
    }
}

/// Ordered `_id` → version chain map
#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: RwLock<BTreeMap<String, VersionChain>>,
    last_committed: AtomicU64,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of the newest published commit
    pub fn last_committed(&self) -> CommitId {
        CommitId::new(self.last_committed.load(Ordering::Acquire))
    }

    /// Location visible to `view`
    pub fn get(&self, id: &str, view: ReadView) -> Option<StorageRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).and_then(|chain| chain.visible(view)).copied()
    }

    /// Location of the newest committed version. Writers read this while
    /// holding the document's exclusive section.
    pub fn latest(&self, id: &str) -> Option<StorageRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).and_then(|chain| chain.latest_record()).copied()
    }

    /// Publish a new version for `id` and return its commit identity.
    ///
    /// The commit identity is allocated and published under the write lock,
    /// so views never observe a gap in commit order.
    pub fn commit(&self, id: &str, payload: VersionPayload) -> CommitId {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let commit_id = self.last_committed().next();
        entries
            .entry(id.to_string())
            .or_default()
            .push(Version::new(commit_id, payload));
        self.last_committed
            .store(commit_id.value(), Ordering::Release);
        commit_id
    }

    /// Publish the first live version of `id`.
    ///
    /// The liveness check and the commit are separate steps; callers hold
    /// the document's exclusive section across both.
    pub fn insert(&self, id: &str, record: StorageRecord) -> IndexResult<CommitId> {
        if self.latest(id).is_some() {
            return Err(IndexError::DuplicateKey(id.to_string()));
        }
        Ok(self.commit(id, VersionPayload::Record(record)))
    }

    /// Publish a tombstone for `id`; `None` if it was not live
    pub fn remove(&self, id: &str) -> Option<CommitId> {
        self.latest(id)?;
        Some(self.commit(id, VersionPayload::Tombstone))
    }

    /// Drop versions of `id` no view at or above `floor` can observe
    pub fn prune(&self, id: &str, floor: CommitId) -> Vec<StorageRecord> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let Some(chain) = entries.get_mut(id) else {
            return Vec::new();
        };
        let dropped = chain.prune(floor);
        if chain.is_empty() {
            entries.remove(id);
        }
        dropped
    }

    /// Number of keys with any retained version
    pub fn chain_count(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of versions held across all chains
    pub fn version_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(VersionChain::len)
            .sum()
    }

    /// Lazy ascending scan of `range` as seen by `view`
    pub fn range(&self, range: KeyRange, view: ReadView) -> KeyRangeIter<'_> {
        let exhausted = range.is_empty();
        KeyRangeIter {
            index: self,
            next_start: range.start_bound(),
            range,
            view,
            buffer: VecDeque::new(),
            exhausted,
        }
    }

    /// Copy up to `limit` visible entries starting at `start`.
    /// Returns the entries and whether the range is exhausted.
    fn scan_batch(
        &self,
        range: &KeyRange,
        start: &Bound<String>,
        view: ReadView,
        limit: usize,
    ) -> (Vec<(String, StorageRecord)>, Option<String>) {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let bounds = (start.as_ref().map(String::as_str), Bound::Unbounded);
        let mut out = Vec::with_capacity(limit);
        let mut last_seen = None;
        let mut examined = 0;
        for (key, chain) in entries.range::<str, _>(bounds) {
            if !range.admits(key) {
                return (out, None);
            }
            examined += 1;
            if let Some(record) = chain.visible(view) {
                out.push((key.clone(), *record));
            }
            if examined == limit {
                last_seen = Some(key.clone());
                break;
            }
        }
        (out, last_seen)
    }
}

/// Lazy ascending iterator over `(id, record)` pairs of a key range.
///
/// Each call that drains the buffer copies the next batch under a short
/// read lock, resuming after the last key examined. Visibility is fixed by
/// the view captured at creation.
pub struct KeyRangeIter<'a> {
    index: &'a KeyIndex,
    range: KeyRange,
    view: ReadView,
    next_start: Bound<String>,
    buffer: VecDeque<(String, StorageRecord)>,
    exhausted: bool,
}

impl<'a> KeyRangeIter<'a> {
    pub fn view(&self) -> ReadView {
        self.view
    }
}

impl<'a> Iterator for KeyRangeIter<'a> {
    type Item = (String, StorageRecord);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }
            if self.exhausted {
                return None;
            }
            let (batch, last_seen) =
                self.index
                    .scan_batch(&self.range, &self.next_start, self.view, SCAN_BATCH);
            self.buffer.extend(batch);
            match last_seen {
                Some(key) => self.next_start = Bound::Excluded(key),
                None => self.exhausted = true,
            }
        }
    }
}
