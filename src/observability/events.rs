//! Observable events emitted by the engine

use std::fmt;

/// Lifecycle and write-path events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A collection was created
    CollectionOpened,
    /// Configuration file loaded
    ConfigLoaded,

    // Write path
    /// Document committed by insert
    DocumentInserted,
    /// Document committed by update
    DocumentUpdated,
    /// Document removed
    DocumentDeleted,
    /// A mutation was rejected before commit
    MutationRejected,

    // Storage tiers
    /// Payload placed in a tier
    TierPlaced,
    /// Payload moved between tiers
    TierMigrated,
    /// Out-of-line store exceeded its bound
    StorageTimeout,
    /// Payload failed checksum or decode (FATAL)
    CorruptionDetected,

    // Secondary indexes
    /// Index registered
    IndexCreated,
    /// Index dropped
    IndexDropped,
    /// Extractor failed for one document; entry skipped
    ExtractorSkipped,

    // Reclamation
    /// Superseded versions reclaimed
    GcCollected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CollectionOpened => "COLLECTION_OPENED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DocumentInserted => "DOCUMENT_INSERTED",
            Event::DocumentUpdated => "DOCUMENT_UPDATED",
            Event::DocumentDeleted => "DOCUMENT_DELETED",
            Event::MutationRejected => "MUTATION_REJECTED",
            Event::TierPlaced => "TIER_PLACED",
            Event::TierMigrated => "TIER_MIGRATED",
            Event::StorageTimeout => "STORAGE_TIMEOUT",
            Event::CorruptionDetected => "CORRUPTION_DETECTED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::ExtractorSkipped => "EXTRACTOR_SKIPPED",
            Event::GcCollected => "GC_COLLECTED",
        }
    }

    /// Returns true if this event indicates lost data integrity
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::CorruptionDetected)
    }

    /// Returns true if this event reports a recoverable problem
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::ExtractorSkipped | Event::StorageTimeout | Event::MutationRejected
        )
    }

    /// Returns true for high-volume per-document events
    pub fn is_per_document(&self) -> bool {
        matches!(
            self,
            Event::DocumentInserted
                | Event::DocumentUpdated
                | Event::DocumentDeleted
                | Event::TierPlaced
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
