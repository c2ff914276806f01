//! Operational counters
//!
//! - Counters only, monotonic
//! - Relaxed atomics; exactness per counter, not across counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one collection
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    rejected_writes: AtomicU64,
    tier_migrations: AtomicU64,
    extractor_skips: AtomicU64,
    storage_timeouts: AtomicU64,
    versions_reclaimed: AtomicU64,
}

/// Plain copy of all counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub rejected_writes: u64,
    pub tier_migrations: u64,
    pub extractor_skips: u64,
    pub storage_timeouts: u64,
    pub versions_reclaimed: u64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_writes(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tier_migrations(&self) {
        self.tier_migrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_extractor_skips(&self) {
        self.extractor_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_timeouts(&self) {
        self.storage_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_versions_reclaimed(&self, n: u64) {
        self.versions_reclaimed.fetch_add(n, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
            tier_migrations: self.tier_migrations.load(Ordering::Relaxed),
            extractor_skips: self.extractor_skips.load(Ordering::Relaxed),
            storage_timeouts: self.storage_timeouts.load(Ordering::Relaxed),
            versions_reclaimed: self.versions_reclaimed.load(Ordering::Relaxed),
        }
    }
}
