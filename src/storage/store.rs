//! Addressable payload stores
//!
//! Both tiers expose the same API; they differ only in expected latency.
//! Payloads are immutable `Arc<[u8]>` so a fetched payload stays valid after
//! the slot is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use super::errors::{StorageError, StorageResult};
use super::record::{Location, Tier};

/// A store that holds payloads by slot
pub trait BackingStore: Send + Sync {
    /// Tier this store backs
    fn tier(&self) -> Tier;

    /// Store a payload in a fresh slot
    fn put(&self, payload: Arc<[u8]>) -> StorageResult<Location>;

    /// Read the payload at `location`
    fn get(&self, location: Location) -> StorageResult<Arc<[u8]>>;

    /// Drop the payload at `location`; returns bytes released
    fn remove(&self, location: Location) -> usize;

    /// Number of payloads held
    fn len(&self) -> usize;

    /// Total payload bytes held
    fn bytes(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slot map shared by both store kinds
#[derive(Debug)]
struct Slots {
    tier: Tier,
    next_slot: AtomicU64,
    payloads: RwLock<HashMap<u64, Arc<[u8]>>>,
}

impl Slots {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            next_slot: AtomicU64::new(0),
            payloads: RwLock::new(HashMap::new()),
        }
    }

    fn put(&self, payload: Arc<[u8]>) -> Location {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let mut payloads = self.payloads.write().unwrap_or_else(|e| e.into_inner());
        payloads.insert(slot, payload);
        Location {
            tier: self.tier,
            slot,
        }
    }

    fn get(&self, location: Location) -> StorageResult<Arc<[u8]>> {
        let payloads = self.payloads.read().unwrap_or_else(|e| e.into_inner());
        payloads
            .get(&location.slot)
            .cloned()
            .ok_or(StorageError::MissingPayload(location))
    }

    fn remove(&self, location: Location) -> usize {
        let mut payloads = self.payloads.write().unwrap_or_else(|e| e.into_inner());
        payloads.remove(&location.slot).map_or(0, |p| p.len())
    }

    fn len(&self) -> usize {
        self.payloads.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn bytes(&self) -> usize {
        self.payloads
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|p| p.len())
            .sum()
    }
}

/// In-row fast path store
#[derive(Debug)]
pub struct InlineStore {
    slots: Slots,
}

impl InlineStore {
    pub fn new() -> Self {
        Self {
            slots: Slots::new(Tier::Inline),
        }
    }
}

impl Default for InlineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for InlineStore {
    fn tier(&self) -> Tier {
        Tier::Inline
    }

    fn put(&self, payload: Arc<[u8]>) -> StorageResult<Location> {
        Ok(self.slots.put(payload))
    }

    fn get(&self, location: Location) -> StorageResult<Arc<[u8]>> {
        self.slots.get(location)
    }

    fn remove(&self, location: Location) -> usize {
        self.slots.remove(location)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn bytes(&self) -> usize {
        self.slots.bytes()
    }
}

/// Larger, slower secondary store.
///
/// Every access costs `latency`. When a `timeout` is configured and the
/// access would exceed it, the call fails with `StorageError::Timeout` after
/// waiting out the bound, and the store is left untouched.
#[derive(Debug)]
pub struct OutOfLineStore {
    slots: Slots,
    latency: Duration,
    timeout: Option<Duration>,
}

impl OutOfLineStore {
    pub fn new(latency: Duration, timeout: Option<Duration>) -> Self {
        Self {
            slots: Slots::new(Tier::OutOfLine),
            latency,
            timeout,
        }
    }

    fn access(&self, operation: &'static str) -> StorageResult<()> {
        match self.timeout {
            Some(bound) if self.latency > bound => {
                thread::sleep(bound);
                Err(StorageError::Timeout {
                    tier: Tier::OutOfLine,
                    operation,
                    bound,
                })
            }
            _ => {
                if !self.latency.is_zero() {
                    thread::sleep(self.latency);
                }
                Ok(())
            }
        }
    }
}

impl Default for OutOfLineStore {
    fn default() -> Self {
        Self::new(Duration::ZERO, None)
    }
}

impl BackingStore for OutOfLineStore {
    fn tier(&self) -> Tier {
        Tier::OutOfLine
    }

    fn put(&self, payload: Arc<[u8]>) -> StorageResult<Location> {
        self.access("put")?;
        Ok(self.slots.put(payload))
    }

    fn get(&self, location: Location) -> StorageResult<Arc<[u8]>> {
        self.access("get")?;
        self.slots.get(location)
    }

    // Releases are bookkeeping and never wait on the store
    fn remove(&self, location: Location) -> usize {
        self.slots.remove(location)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn bytes(&self) -> usize {
        self.slots.bytes()
    }
}
