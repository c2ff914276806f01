//! Storage tier manager
//!
//! Chooses a tier per document from its encoded size and keeps the payload
//! in that tier's store. Placement is copy-on-write: `remigrate` always
//! writes a fresh slot and leaves the previous one for the caller to
//! `release` once no reader can still reach it.

use std::sync::Arc;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::observability::{log_event, Event, MetricsRegistry};

use super::errors::{StorageError, StorageResult};
use super::record::{StorageRecord, Tier};
use super::store::{BackingStore, InlineStore, OutOfLineStore};

/// Size-based placement rule.
///
/// `size < threshold` is INLINE, `size >= threshold` is OUT_OF_LINE, except
/// that an out-of-line document shrinking into the hysteresis band
/// `[threshold - hysteresis, threshold)` stays where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    threshold: usize,
    hysteresis: usize,
    max_document_bytes: usize,
}

impl TierPolicy {
    pub fn new(threshold: usize, hysteresis: usize, max_document_bytes: usize) -> Self {
        Self {
            threshold,
            hysteresis,
            max_document_bytes,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.inline_threshold_bytes,
            config.tier_hysteresis_bytes,
            config.max_document_bytes,
        )
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }

    /// Reject sizes above the hard maximum
    pub fn check_size(&self, size: usize) -> StorageResult<()> {
        if size > self.max_document_bytes {
            return Err(StorageError::DocumentTooLarge {
                size,
                max: self.max_document_bytes,
            });
        }
        Ok(())
    }

    /// Tier for a payload of `size` bytes currently in `current`
    pub fn choose(&self, size: usize, current: Option<Tier>) -> Tier {
        if size >= self.threshold {
            return Tier::OutOfLine;
        }
        let floor = self.threshold - self.hysteresis;
        match current {
            Some(Tier::OutOfLine) if size >= floor => Tier::OutOfLine,
            _ => Tier::Inline,
        }
    }
}

/// Per-tier occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub inline_documents: usize,
    pub inline_bytes: usize,
    pub out_of_line_documents: usize,
    pub out_of_line_bytes: usize,
}

/// Owns both stores and the placement policy. Every store timeout, on
/// reads and writes alike, is logged and counted here.
#[derive(Debug)]
pub struct TierManager {
    policy: TierPolicy,
    inline: InlineStore,
    out_of_line: OutOfLineStore,
    metrics: Arc<MetricsRegistry>,
}

impl TierManager {
    pub fn new(config: &EngineConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            policy: TierPolicy::from_config(config),
            inline: InlineStore::new(),
            out_of_line: OutOfLineStore::new(
                config.out_of_line_latency(),
                config.out_of_line_timeout(),
            ),
            metrics,
        }
    }

    fn store(&self, tier: Tier) -> &dyn BackingStore {
        match tier {
            Tier::Inline => &self.inline,
            Tier::OutOfLine => &self.out_of_line,
        }
    }

    fn put(&self, id: &str, tier: Tier, bytes: Vec<u8>) -> StorageResult<StorageRecord> {
        let size = bytes.len();
        match self.store(tier).put(Arc::from(bytes)) {
            Ok(location) => Ok(StorageRecord::new(location, size)),
            Err(e) => {
                if matches!(e, StorageError::Timeout { .. }) {
                    self.metrics.increment_storage_timeouts();
                    let size_str = size.to_string();
                    log_event(
                        Event::StorageTimeout,
                        &[("id", id), ("operation", "put"), ("size_bytes", size_str.as_str())],
                    );
                }
                Err(e)
            }
        }
    }

    /// Store a new document payload
    pub fn place(&self, id: &str, bytes: Vec<u8>) -> StorageResult<StorageRecord> {
        self.policy.check_size(bytes.len())?;
        let tier = self.policy.choose(bytes.len(), None);
        let record = self.put(id, tier, bytes)?;

        let size_str = record.size_bytes().to_string();
        log_event(
            Event::TierPlaced,
            &[("id", id), ("size_bytes", size_str.as_str()), ("tier", tier.as_str())],
        );
        Ok(record)
    }

    /// Read a payload from whichever tier holds it
    pub fn fetch(&self, record: &StorageRecord) -> StorageResult<Arc<[u8]>> {
        let result = self.store(record.tier()).get(record.location());
        if let Err(StorageError::Timeout { .. }) = &result {
            self.metrics.increment_storage_timeouts();
            let location = record.location().to_string();
            log_event(
                Event::StorageTimeout,
                &[("location", location.as_str()), ("operation", "get")],
            );
        }
        result
    }

    /// Store the updated payload of an existing document, re-evaluating its
    /// tier. The previous record stays readable until released.
    pub fn remigrate(
        &self,
        id: &str,
        record: &StorageRecord,
        new_bytes: Vec<u8>,
    ) -> StorageResult<StorageRecord> {
        self.policy.check_size(new_bytes.len())?;
        let tier = self.policy.choose(new_bytes.len(), Some(record.tier()));
        let updated = self.put(id, tier, new_bytes)?;

        if updated.tier() != record.tier() {
            let old_size = record.size_bytes().to_string();
            let new_size = updated.size_bytes().to_string();
            log_event(
                Event::TierMigrated,
                &[
                    ("from", record.tier().as_str()),
                    ("id", id),
                    ("new_size_bytes", new_size.as_str()),
                    ("old_size_bytes", old_size.as_str()),
                    ("to", updated.tier().as_str()),
                ],
            );
        }
        Ok(updated)
    }

    /// Free the payload behind `record`; returns bytes released
    pub fn release(&self, record: &StorageRecord) -> usize {
        self.store(record.tier()).remove(record.location())
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            inline_documents: self.inline.len(),
            inline_bytes: self.inline.bytes(),
            out_of_line_documents: self.out_of_line.len(),
            out_of_line_bytes: self.out_of_line.bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager(threshold: usize) -> TierManager {
        TierManager::new(
            &EngineConfig::default()
                .with_inline_threshold(threshold)
                .with_max_document_bytes(1000),
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[test]
    fn test_policy_boundary() {
        let policy = TierPolicy::new(100, 0, 1000);
        assert_eq!(policy.choose(99, None), Tier::Inline);
        assert_eq!(policy.choose(100, None), Tier::OutOfLine);
        assert_eq!(policy.choose(99, Some(Tier::OutOfLine)), Tier::Inline);
    }

    #[test]
    fn test_policy_hysteresis() {
        let policy = TierPolicy::new(100, 10, 1000);
        assert_eq!(policy.choose(95, Some(Tier::OutOfLine)), Tier::OutOfLine);
        assert_eq!(policy.choose(90, Some(Tier::OutOfLine)), Tier::OutOfLine);
        assert_eq!(policy.choose(89, Some(Tier::OutOfLine)), Tier::Inline);
        // Growing never uses the band
        assert_eq!(policy.choose(95, Some(Tier::Inline)), Tier::Inline);
    }

    #[test]
    fn test_place_and_fetch() {
        let tiers = manager(10);
        let small = tiers.place("a", vec![1; 9]).unwrap();
        let large = tiers.place("b", vec![2; 10]).unwrap();
        assert_eq!(small.tier(), Tier::Inline);
        assert_eq!(large.tier(), Tier::OutOfLine);
        assert_eq!(&*tiers.fetch(&large).unwrap(), &[2; 10][..]);

        let stats = tiers.stats();
        assert_eq!(stats.inline_documents, 1);
        assert_eq!(stats.out_of_line_bytes, 10);
    }

    #[test]
    fn test_too_large_rejected_without_placement() {
        let tiers = manager(10);
        let err = tiers.place("a", vec![0; 1001]).unwrap_err();
        assert_eq!(err, StorageError::DocumentTooLarge { size: 1001, max: 1000 });
        assert_eq!(tiers.stats(), TierStats::default());
    }

    #[test]
    fn test_remigrate_is_copy_on_write() {
        let tiers = manager(10);
        let first = tiers.place("a", vec![1; 5]).unwrap();
        let grown = tiers.remigrate("a", &first, vec![1; 20]).unwrap();
        assert_eq!(grown.tier(), Tier::OutOfLine);
        // Old payload still readable until released
        assert_eq!(tiers.fetch(&first).unwrap().len(), 5);
        assert_eq!(tiers.release(&first), 5);
        assert!(tiers.fetch(&first).is_err());

        let shrunk = tiers.remigrate("a", &grown, vec![1; 3]).unwrap();
        assert_eq!(shrunk.tier(), Tier::Inline);
    }

    #[test]
    fn test_timeout_on_out_of_line_place() {
        let config = EngineConfig::default()
            .with_inline_threshold(10)
            .with_out_of_line_latency(Duration::from_millis(20))
            .with_out_of_line_timeout(Duration::from_millis(1));
        let metrics = Arc::new(MetricsRegistry::new());
        let tiers = TierManager::new(&config, Arc::clone(&metrics));
        assert!(tiers.place("small", vec![0; 5]).is_ok());
        let err = tiers.place("big", vec![0; 50]).unwrap_err();
        assert!(matches!(err, StorageError::Timeout { .. }));
        assert_eq!(tiers.stats().out_of_line_documents, 0);
        assert_eq!(metrics.snapshot().storage_timeouts, 1);
    }
}
