//! Collection façade
//!
//! Combines the key index, storage tiers, codec, secondary indexes and
//! mutation engine behind one thread-safe handle.
//!
//! # Concurrency
//!
//! - Reads open a [`ReadView`] at invocation start and see exactly the
//!   commits at or below it. They take no document locks.
//! - Writes hold the document's exclusive section from the liveness check
//!   to the commit, so writes to one `_id` apply in a total order.
//! - Index entries a write adds exist before it commits; entries it drops
//!   are reclaimed only after every older view has closed.
//!
//! Deletes are idempotent: deleting an absent id returns `Ok(false)`.

mod cursor;
mod gc;
mod locks;

pub use cursor::{DocumentCursor, MetadataCursor, QueryCursor};
pub use gc::GcReport;

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::config::EngineConfig;
use crate::document::{Document, ID_FIELD};
use crate::error::{Error, Result};
use crate::index::{
    IndexDefinition, IndexInfo, IndexManager, IndexPredicate, KeyIndex, KeyRange,
};
use crate::mutation::{record_rejection, Mutation, MutationEngine, UpdateOutcome};
use crate::mvcc::{ReadView, VisibilityFloor};
use crate::observability::{log_event, Event, Logger, MetricsRegistry, MetricsSnapshot};
use crate::storage::{StorageRecord, Tier, TierManager, TierStats};

use gc::{Garbage, GarbageQueue};
use locks::DocumentLocks;

/// Placement of one document, without its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub id: String,
    pub tier: Tier,
    pub size_bytes: usize,
}

impl DocumentMeta {
    fn new(id: String, record: &StorageRecord) -> Self {
        Self {
            id,
            tier: record.tier(),
            size_bytes: record.size_bytes(),
        }
    }
}

/// Point-in-time summary of a collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub documents: usize,
    pub versions: usize,
    pub tiers: TierStats,
    pub indexes: Vec<IndexInfo>,
    pub active_views: usize,
    pub pending_garbage: usize,
    pub metrics: MetricsSnapshot,
}

/// A single-namespace document store
#[derive(Debug)]
pub struct Collection {
    config: EngineConfig,
    keys: KeyIndex,
    tiers: TierManager,
    indexes: IndexManager,
    locks: DocumentLocks,
    views: Mutex<VisibilityFloor>,
    garbage: GarbageQueue,
    /// Writers share it from index maintenance to commit; index
    /// registration takes it exclusively
    index_ddl: RwLock<()>,
    metrics: Arc<MetricsRegistry>,
}

impl Collection {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Logger::set_min_severity(config.log_severity());

        let metrics = Arc::new(MetricsRegistry::new());
        let collection = Self {
            keys: KeyIndex::new(),
            tiers: TierManager::new(&config, Arc::clone(&metrics)),
            indexes: IndexManager::new(Arc::clone(&metrics)),
            locks: DocumentLocks::new(),
            views: Mutex::new(VisibilityFloor::new()),
            garbage: GarbageQueue::new(),
            index_ddl: RwLock::new(()),
            metrics,
            config,
        };

        let threshold = collection.config.inline_threshold_bytes.to_string();
        let max = collection.config.max_document_bytes.to_string();
        log_event(
            Event::CollectionOpened,
            &[
                ("inline_threshold_bytes", threshold.as_str()),
                ("max_document_bytes", max.as_str()),
            ],
        );
        Ok(collection)
    }

    /// Collection configured from a JSON file
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = EngineConfig::load(config_path)?;
        Self::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Store a new document and return its `_id`, generating one if absent
    pub fn insert(&self, value: Value) -> Result<String> {
        let claimed_id = value
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut doc = match Document::from_value(value, self.config.max_nesting_depth) {
            Ok(doc) => doc,
            Err(err) => {
                let err = Error::from(err);
                record_rejection(&self.metrics, &claimed_id, "insert", &err);
                return Err(err);
            }
        };
        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                doc.set_id(id.clone());
                id
            }
        };

        {
            let _guard = self.locks.lock(&id);
            let _ddl = self.index_ddl.read().unwrap_or_else(|e| e.into_inner());
            match self.insert_locked(&id, &doc) {
                Ok(garbage) => self.garbage.push(garbage),
                Err(err) => {
                    record_rejection(&self.metrics, &id, "insert", &err);
                    return Err(err);
                }
            }
        }
        self.collect_garbage();
        Ok(id)
    }

    fn insert_locked(&self, id: &str, doc: &Document) -> Result<Garbage> {
        if self.keys.latest(id).is_some() {
            return Err(Error::DuplicateKey(id.to_string()));
        }
        let bytes = codec::encode(doc)?;
        let record = self.tiers.place(id, bytes)?;
        let stale = self.indexes.on_insert(doc);
        let commit = self.keys.insert(id, record)?;

        self.metrics.increment_inserts();
        let commit_str = commit.value().to_string();
        log_event(
            Event::DocumentInserted,
            &[
                ("commit", commit_str.as_str()),
                ("id", id),
                ("tier", record.tier().as_str()),
            ],
        );
        Ok(Garbage {
            commit,
            id: id.to_string(),
            stale,
        })
    }

    /// Insert in order, stopping at the first failure. Documents before
    /// the failure stay inserted.
    pub fn insert_many<I>(&self, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = Value>,
    {
        values.into_iter().map(|value| self.insert(value)).collect()
    }

    /// Apply `mutation` and return the committed document
    pub fn update(&self, id: &str, mutation: Mutation) -> Result<Document> {
        Ok(self.update_traced(id, mutation)?.document)
    }

    /// Apply `mutation` and report how it went through the pipeline
    pub fn update_traced(&self, id: &str, mutation: Mutation) -> Result<UpdateOutcome> {
        let outcome = {
            let _guard = self.locks.lock(id);
            let _ddl = self.index_ddl.read().unwrap_or_else(|e| e.into_inner());
            let record = self
                .keys
                .latest(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let current = self.load(id, &record).map_err(|err| {
                record_rejection(&self.metrics, id, "update", &err);
                err
            })?;
            let applied = self.engine().run(id, &current, &record, &mutation)?;
            self.garbage.push(Garbage {
                commit: applied.outcome.commit,
                id: id.to_string(),
                stale: applied.stale,
            });
            applied.outcome
        };
        self.collect_garbage();
        Ok(outcome)
    }

    /// Remove `id`. Returns false if nothing was live.
    pub fn delete(&self, id: &str) -> Result<bool> {
        {
            let _guard = self.locks.lock(id);
            let _ddl = self.index_ddl.read().unwrap_or_else(|e| e.into_inner());
            if self.keys.latest(id).is_none() {
                return Ok(false);
            }
            let stale = self.indexes.on_delete(id);
            let Some(commit) = self.keys.remove(id) else {
                return Ok(false);
            };
            self.garbage.push(Garbage {
                commit,
                id: id.to_string(),
                stale,
            });

            self.metrics.increment_deletes();
            let commit_str = commit.value().to_string();
            log_event(
                Event::DocumentDeleted,
                &[("commit", commit_str.as_str()), ("id", id)],
            );
        }
        self.collect_garbage();
        Ok(true)
    }

    fn engine(&self) -> MutationEngine<'_> {
        MutationEngine {
            keys: &self.keys,
            tiers: &self.tiers,
            indexes: &self.indexes,
            metrics: &self.metrics,
            max_depth: self.config.max_nesting_depth,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Result<Document> {
        let snapshot = self.snapshot();
        let record = self
            .keys
            .get(id, snapshot.view())
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.load(id, &record)
    }

    /// Documents in `range`, ascending by `_id`, as of the call
    pub fn get_range(&self, range: KeyRange) -> DocumentCursor<'_> {
        let snapshot = self.snapshot();
        let entries = self.keys.range(range, snapshot.view());
        DocumentCursor::new(self, snapshot, entries)
    }

    /// Documents whose `_id` starts with `prefix`
    pub fn get_prefix(&self, prefix: &str) -> DocumentCursor<'_> {
        self.get_range(KeyRange::prefix(prefix))
    }

    /// Documents matching `predicate` on index `name`, ascending by `_id`.
    /// Every candidate is rechecked against the document the view sees.
    pub fn query_by_index(&self, name: &str, predicate: IndexPredicate) -> Result<QueryCursor<'_>> {
        let snapshot = self.snapshot();
        let index = self.indexes.get(name)?;
        let candidates = index.lookup(&predicate)?;
        Ok(QueryCursor::new(self, snapshot, index, predicate, candidates))
    }

    /// Tier and size of `id` without reading its payload
    pub fn metadata(&self, id: &str) -> Result<DocumentMeta> {
        let snapshot = self.snapshot();
        let record = self
            .keys
            .get(id, snapshot.view())
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(DocumentMeta::new(id.to_string(), &record))
    }

    /// Metadata for every document in `range`
    pub fn sizes(&self, range: KeyRange) -> MetadataCursor<'_> {
        let snapshot = self.snapshot();
        let entries = self.keys.range(range, snapshot.view());
        MetadataCursor::new(snapshot, entries)
    }

    /// Number of live documents in `range`
    pub fn count(&self, range: KeyRange) -> usize {
        self.sizes(range).count()
    }

    // ------------------------------------------------------------------
    // Secondary indexes
    // ------------------------------------------------------------------

    /// Register an index and back-fill it from the current documents.
    /// Returns the number of documents indexed.
    pub fn create_index(&self, definition: IndexDefinition) -> Result<usize> {
        let name = definition.name.clone();
        let snapshot = {
            let _ddl = self.index_ddl.write().unwrap_or_else(|e| e.into_inner());
            self.indexes.create_index(definition)?;
            self.snapshot()
        };

        let documents = self
            .keys
            .range(KeyRange::All, snapshot.view())
            .map(|(id, record)| self.load(&id, &record))
            .collect::<Result<Vec<_>>>();
        let documents = match documents {
            Ok(documents) => documents,
            Err(err) => {
                // Leave no half-built index behind
                let _ = self.indexes.drop_index(&name);
                return Err(err);
            }
        };
        Ok(self.indexes.backfill(&name, documents)?)
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        Ok(self.indexes.drop_index(name)?)
    }

    pub fn list_indexes(&self) -> Vec<IndexInfo> {
        self.indexes.list_indexes()
    }

    /// Entries in `name`, including dropped ones awaiting reclamation
    pub fn index_entry_count(&self, name: &str) -> Result<usize> {
        Ok(self.indexes.index_entry_count(name)?)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Reclaim versions, payloads and index entries no open view can see
    pub fn collect_garbage(&self) -> GcReport {
        let floor = {
            let views = self.views.lock().unwrap_or_else(|e| e.into_inner());
            views.floor(self.keys.last_committed())
        };
        let report = self
            .garbage
            .collect(floor, &self.keys, &self.tiers, &self.indexes);
        if report.versions_reclaimed > 0 || report.index_entries_purged > 0 {
            self.metrics
                .add_versions_reclaimed(report.versions_reclaimed as u64);
            let versions = report.versions_reclaimed.to_string();
            let bytes = report.bytes_released.to_string();
            let entries = report.index_entries_purged.to_string();
            log_event(
                Event::GcCollected,
                &[
                    ("bytes_released", bytes.as_str()),
                    ("index_entries", entries.as_str()),
                    ("versions", versions.as_str()),
                ],
            );
        }
        report
    }

    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            documents: self.count(KeyRange::All),
            versions: self.keys.version_count(),
            tiers: self.tiers.stats(),
            indexes: self.indexes.list_indexes(),
            active_views: self
                .views
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .active_view_count(),
            pending_garbage: self.garbage.len(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Register a view at the newest commit. Registration and the floor
    /// computation share one lock, so reclamation never overtakes a view
    /// being opened.
    fn snapshot(&self) -> Snapshot<'_> {
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        let view = ReadView::new(self.keys.last_committed());
        views.register(view);
        Snapshot {
            collection: self,
            view,
        }
    }

    /// Fetch and decode the payload behind `record`
    fn load(&self, id: &str, record: &StorageRecord) -> Result<Document> {
        let result = self
            .tiers
            .fetch(record)
            .map_err(Error::from)
            .and_then(|bytes| codec::decode(&bytes).map_err(Error::from));
        if let Err(err) = &result {
            if err.is_corruption() {
                let location = record.location().to_string();
                let reason = err.to_string();
                log_event(
                    Event::CorruptionDetected,
                    &[
                        ("id", id),
                        ("location", location.as_str()),
                        ("reason", reason.as_str()),
                    ],
                );
            }
        }
        result
    }
}

/// A registered read view, released on drop
#[derive(Debug)]
pub(crate) struct Snapshot<'a> {
    collection: &'a Collection,
    view: ReadView,
}

impl Snapshot<'_> {
    pub fn view(&self) -> ReadView {
        self.view
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        self.collection
            .views
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unregister(self.view);
    }
}
