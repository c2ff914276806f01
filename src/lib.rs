//! docvault - an in-memory document store
//!
//! Single-collection JSON document storage with:
//! - Composite string keys in an ordered index (exact, prefix and range)
//! - Inline and out-of-line storage tiers chosen by encoded size
//! - Merge-patch and path-transform updates, atomic per document
//! - Scalar and multivalue secondary indexes
//! - Snapshot reads that never block writers
//!
//! ```no_run
//! use docvault::{Collection, EngineConfig, KeyRange};
//! use serde_json::json;
//!
//! let orders = Collection::new(EngineConfig::default())?;
//! orders.insert(json!({"_id": "CUSTOMER#1#ORDER#1", "type": "order", "total": 10}))?;
//! for doc in orders.get_range(KeyRange::prefix("CUSTOMER#1#ORDER#")) {
//!     println!("{:?}", doc?.id());
//! }
//! # Ok::<(), docvault::Error>(())
//! ```

pub mod cli;
pub mod codec;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod mutation;
pub mod mvcc;
pub mod observability;
pub mod storage;

pub use collection::{Collection, CollectionStats, DocumentMeta, GcReport};
pub use config::EngineConfig;
pub use document::{Document, JsonPath};
pub use error::{Error, Result};
pub use index::{Extractor, IndexDefinition, IndexPredicate, KeyRange};
pub use mutation::{Mutation, MutationState, PathOp, UpdateOutcome};
pub use storage::Tier;
