//! Indexing for docvault
//!
//! - `KeyIndex`: ordered `_id` -> version chain, exact and range lookup
//! - `IndexManager`: named secondary indexes over extracted values
//!
//! Both are in-memory and rebuilt by value, never referenced by pointer
//! from outside the collection.

mod btree;
mod errors;
mod extractor;
mod key_index;
mod manager;
mod predicate;

pub use btree::{IndexKey, IndexTree, OrderedNumber};
pub use errors::{IndexError, IndexResult};
pub use extractor::{ExtractFn, Extractor};
pub use key_index::{KeyIndex, KeyRange, KeyRangeIter};
pub use manager::{IndexDefinition, IndexInfo, IndexManager, SecondaryIndex, StaleEntry};
pub use predicate::{IndexPredicate, MatchFn};
