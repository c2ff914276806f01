//! Deferred reclamation
//!
//! Every commit leaves behind work that must wait until no open view can
//! observe the state it replaced: superseded versions, their payloads, and
//! index entries the write dropped. Entries become collectable once the
//! visibility floor reaches their commit.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::index::{IndexManager, KeyIndex, StaleEntry};
use crate::mvcc::CommitId;
use crate::storage::TierManager;

/// Work left by one commit
#[derive(Debug)]
pub(crate) struct Garbage {
    pub commit: CommitId,
    pub id: String,
    pub stale: Vec<StaleEntry>,
}

/// What one collection pass reclaimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub floor: u64,
    pub versions_reclaimed: usize,
    pub bytes_released: usize,
    pub index_entries_purged: usize,
    /// Commits still waiting on an open view
    pub pending: usize,
}

#[derive(Debug, Default)]
pub(crate) struct GarbageQueue {
    pending: Mutex<VecDeque<Garbage>>,
}

impl GarbageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, garbage: Garbage) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(garbage);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Reclaim everything at or below `floor`
    pub fn collect(
        &self,
        floor: CommitId,
        keys: &KeyIndex,
        tiers: &TierManager,
        indexes: &IndexManager,
    ) -> GcReport {
        let (ready, pending) = {
            let mut queue = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            // Commits are pushed after publication, so the queue is only
            // roughly ordered
            let (ready, rest): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|g| g.commit <= floor);
            *queue = rest;
            (ready, queue.len())
        };

        let mut report = GcReport {
            floor: floor.value(),
            pending,
            ..GcReport::default()
        };
        for garbage in ready {
            for record in keys.prune(&garbage.id, floor) {
                report.versions_reclaimed += 1;
                report.bytes_released += tiers.release(&record);
            }
            report.index_entries_purged += indexes.purge(&garbage.stale);
        }
        report
    }
}
