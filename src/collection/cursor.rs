//! Lazy result sequences
//!
//! Each cursor owns the read view it was opened with and releases it when
//! dropped. Re-running a query opens a fresh view.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::index::{IndexPredicate, KeyRangeIter, SecondaryIndex};

use super::{Collection, DocumentMeta, Snapshot};

/// Documents of a key range, ascending by `_id`
pub struct DocumentCursor<'a> {
    collection: &'a Collection,
    _snapshot: Snapshot<'a>,
    entries: KeyRangeIter<'a>,
}

impl<'a> DocumentCursor<'a> {
    pub(crate) fn new(collection: &'a Collection, snapshot: Snapshot<'a>, entries: KeyRangeIter<'a>) -> Self {
        Self {
            collection,
            _snapshot: snapshot,
            entries,
        }
    }
}

impl Iterator for DocumentCursor<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, record) = self.entries.next()?;
        Some(self.collection.load(&id, &record))
    }
}

/// Documents matching an index predicate, ascending by `_id`
pub struct QueryCursor<'a> {
    collection: &'a Collection,
    snapshot: Snapshot<'a>,
    index: Arc<SecondaryIndex>,
    predicate: IndexPredicate,
    candidates: btree_set::IntoIter<String>,
}

impl<'a> QueryCursor<'a> {
    pub(crate) fn new(
        collection: &'a Collection,
        snapshot: Snapshot<'a>,
        index: Arc<SecondaryIndex>,
        predicate: IndexPredicate,
        candidates: BTreeSet<String>,
    ) -> Self {
        Self {
            collection,
            snapshot,
            index,
            predicate,
            candidates: candidates.into_iter(),
        }
    }
}

impl Iterator for QueryCursor<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.candidates.by_ref() {
            // Candidates may include entries added after the view or kept
            // for older views
            let Some(record) = self.collection.keys.get(&id, self.snapshot.view()) else {
                continue;
            };
            match self.collection.load(&id, &record) {
                Ok(doc) if self.index.accepts(&doc, &self.predicate) => return Some(Ok(doc)),
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

/// Placement metadata of a key range, ascending by `_id`
pub struct MetadataCursor<'a> {
    _snapshot: Snapshot<'a>,
    entries: KeyRangeIter<'a>,
}

impl<'a> MetadataCursor<'a> {
    pub(crate) fn new(snapshot: Snapshot<'a>, entries: KeyRangeIter<'a>) -> Self {
        Self {
            _snapshot: snapshot,
            entries,
        }
    }
}

impl Iterator for MetadataCursor<'_> {
    type Item = DocumentMeta;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, record) = self.entries.next()?;
        Some(DocumentMeta::new(id, &record))
    }
}
