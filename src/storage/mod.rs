//! Tiered record storage
//!
//! - Small payloads live in the inline store, large ones out-of-line
//! - Placement is decided from encoded size alone
//! - Payloads are immutable; updates write new slots (copy-on-write)
//! - Slots are never reused, so a stale record can never alias new data

mod errors;
mod record;
mod store;
mod tier;

pub use errors::{StorageError, StorageResult};
pub use record::{Location, StorageRecord, Tier};
pub use store::{BackingStore, InlineStore, OutOfLineStore};
pub use tier::{TierManager, TierPolicy, TierStats};
