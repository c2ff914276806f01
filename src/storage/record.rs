//! Storage records: where a document's payload lives and how large it is

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placement tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Small documents, fast path
    Inline,
    /// Large documents, secondary store
    OutOfLine,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Inline => "INLINE",
            Tier::OutOfLine => "OUT_OF_LINE",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a payload inside one tier's store.
///
/// Slots are allocated monotonically per store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub tier: Tier,
    pub slot: u64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.slot)
    }
}

/// Persisted form of one document version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRecord {
    location: Location,
    size_bytes: usize,
}

impl StorageRecord {
    pub fn new(location: Location, size_bytes: usize) -> Self {
        Self {
            location,
            size_bytes,
        }
    }

    #[inline]
    pub fn tier(&self) -> Tier {
        self.location.tier
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
