//! Secondary index manager
//!
//! Maintains named scalar and multivalue indexes over document values.
//!
//! # API
//!
//! - `create_index(def)` / `backfill(name, docs)` - Register then populate
//! - `on_insert` / `on_update` / `on_delete` - Maintain after a write
//! - `purge(stale)` - Remove entries no snapshot can still observe
//! - `lookup(name, predicate)` - Candidate ids for a predicate
//!
//! New keys are added before the owning write commits, so a committed write
//! is always reachable through its indexes. Keys a write drops come back as
//! [`StaleEntry`] values and stay in the tree until the caller purges them
//! once no open snapshot predates the write. Callers recheck candidates
//! against their snapshot document.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::document::Document;
use crate::observability::{log_event, Event, MetricsRegistry};

use super::btree::{IndexKey, IndexTree};
use super::errors::{IndexError, IndexResult};
use super::extractor::Extractor;
use super::predicate::IndexPredicate;

/// Registration parameters for one index
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub extractor: Extractor,
    /// One entry per array element instead of one per document
    pub multivalue: bool,
}

impl IndexDefinition {
    pub fn scalar(name: impl Into<String>, extractor: Extractor) -> Self {
        Self {
            name: name.into(),
            extractor,
            multivalue: false,
        }
    }

    pub fn multivalue(name: impl Into<String>, extractor: Extractor) -> Self {
        Self {
            name: name.into(),
            extractor,
            multivalue: true,
        }
    }
}

/// Description of a registered index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub extractor: String,
    pub multivalue: bool,
    pub entries: usize,
    pub ready: bool,
}

/// An index entry dropped by a write, awaiting reclamation
#[derive(Debug, Clone)]
pub struct StaleEntry {
    index: Arc<SecondaryIndex>,
    key: IndexKey,
    id: String,
}

impl StaleEntry {
    pub fn index_name(&self) -> &str {
        &self.index.definition.name
    }

    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Default)]
struct IndexState {
    tree: IndexTree,
    /// Keys currently recorded for each live document
    forward: HashMap<String, BTreeSet<IndexKey>>,
    /// Ids written while the back-fill runs; `None` once ready
    building: Option<HashSet<String>>,
}

/// One registered index
#[derive(Debug)]
pub struct SecondaryIndex {
    definition: IndexDefinition,
    state: RwLock<IndexState>,
}

impl SecondaryIndex {
    fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            state: RwLock::new(IndexState {
                building: Some(HashSet::new()),
                ..IndexState::default()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Candidate ids for `predicate`
    pub fn lookup(&self, predicate: &IndexPredicate) -> IndexResult<BTreeSet<String>> {
        let state = self.read();
        if state.building.is_some() {
            return Err(IndexError::Building(self.definition.name.clone()));
        }
        Ok(predicate.candidates(&state.tree))
    }

    /// Whether `doc` itself satisfies `predicate` under this index's extractor.
    /// A document the extractor rejects never matches.
    pub fn accepts(&self, doc: &Document, predicate: &IndexPredicate) -> bool {
        self.definition
            .extractor
            .keys(doc, self.definition.multivalue)
            .is_ok_and(|keys| predicate.accepts_any(&keys))
    }

    pub fn entry_count(&self) -> usize {
        self.read().tree.entry_count()
    }

    fn info(&self) -> IndexInfo {
        let state = self.read();
        IndexInfo {
            name: self.definition.name.clone(),
            extractor: self.definition.extractor.to_string(),
            multivalue: self.definition.multivalue,
            entries: state.tree.entry_count(),
            ready: state.building.is_none(),
        }
    }

    /// Keys for `doc`, or none when the extractor fails
    fn keys_for(&self, id: &str, doc: &Document, metrics: &MetricsRegistry) -> BTreeSet<IndexKey> {
        match self.definition.extractor.keys(doc, self.definition.multivalue) {
            Ok(keys) => keys,
            Err(reason) => {
                metrics.increment_extractor_skips();
                log_event(
                    Event::ExtractorSkipped,
                    &[
                        ("index", self.definition.name.as_str()),
                        ("id", id),
                        ("reason", reason.as_str()),
                    ],
                );
                BTreeSet::new()
            }
        }
    }

    /// Record `keys` as the document's current keys. Returns the keys it no
    /// longer has; those stay in the tree until purged.
    fn replace_keys(self: &Arc<Self>, id: &str, keys: Option<BTreeSet<IndexKey>>) -> Vec<StaleEntry> {
        let mut state = self.write();
        if let Some(touched) = state.building.as_mut() {
            touched.insert(id.to_string());
        }
        let previous = match keys {
            Some(keys) => {
                for key in &keys {
                    state.tree.insert(key.clone(), id);
                }
                state.forward.insert(id.to_string(), keys)
            }
            None => state.forward.remove(id),
        };
        let current = state.forward.get(id);
        previous
            .unwrap_or_default()
            .into_iter()
            .filter(|key| !current.is_some_and(|keys| keys.contains(key)))
            .map(|key| StaleEntry {
                index: Arc::clone(self),
                key,
                id: id.to_string(),
            })
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of secondary indexes for one collection
#[derive(Debug)]
pub struct IndexManager {
    indexes: RwLock<BTreeMap<String, Arc<SecondaryIndex>>>,
    metrics: Arc<MetricsRegistry>,
}

impl IndexManager {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            indexes: RwLock::new(BTreeMap::new()),
            metrics,
        }
    }

    /// Register an index. It starts maintained by writes but not queryable
    /// until [`IndexManager::backfill`] completes.
    pub fn create_index(&self, definition: IndexDefinition) -> IndexResult<()> {
        let mut indexes = self.indexes.write().unwrap_or_else(|e| e.into_inner());
        if indexes.contains_key(&definition.name) {
            return Err(IndexError::AlreadyExists(definition.name));
        }
        let name = definition.name.clone();
        indexes.insert(name, Arc::new(SecondaryIndex::new(definition)));
        Ok(())
    }

    /// Populate `name` from a snapshot of existing documents, then open it
    /// for queries. Documents written since registration already carry
    /// newer keys and are skipped. Returns the number of documents indexed.
    pub fn backfill<I>(&self, name: &str, documents: I) -> IndexResult<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let index = self.get(name)?;
        let mut indexed = 0;
        for doc in documents {
            let Some(id) = doc.id() else { continue };
            let keys = index.keys_for(id, &doc, &self.metrics);
            let mut state = index.write();
            if state.building.as_ref().is_some_and(|touched| touched.contains(id)) {
                continue;
            }
            for key in &keys {
                state.tree.insert(key.clone(), id);
            }
            state.forward.insert(id.to_string(), keys);
            indexed += 1;
        }
        index.write().building = None;

        log_event(
            Event::IndexCreated,
            &[
                ("index", name),
                ("multivalue", if index.definition.multivalue { "true" } else { "false" }),
                ("documents", indexed.to_string().as_str()),
            ],
        );
        Ok(indexed)
    }

    pub fn drop_index(&self, name: &str) -> IndexResult<()> {
        let removed = self
            .indexes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        match removed {
            Some(_) => {
                log_event(Event::IndexDropped, &[("index", name)]);
                Ok(())
            }
            None => Err(IndexError::UnknownIndex(name.to_string())),
        }
    }

    /// Registered indexes in name order
    pub fn list_indexes(&self) -> Vec<IndexInfo> {
        self.snapshot().iter().map(|index| index.info()).collect()
    }

    pub fn get(&self, name: &str) -> IndexResult<Arc<SecondaryIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::UnknownIndex(name.to_string()))
    }

    pub fn index_entry_count(&self, name: &str) -> IndexResult<usize> {
        Ok(self.get(name)?.entry_count())
    }

    /// Candidate ids; callers recheck them against their snapshot
    pub fn lookup(&self, name: &str, predicate: &IndexPredicate) -> IndexResult<BTreeSet<String>> {
        self.get(name)?.lookup(predicate)
    }

    pub fn on_insert(&self, doc: &Document) -> Vec<StaleEntry> {
        self.apply(doc.id().unwrap_or_default(), Some(doc))
    }

    /// Only the delta between `old` and `new` keys changes. `old`'s keys are
    /// the ones recorded when it was written.
    pub fn on_update(&self, old: &Document, new: &Document) -> Vec<StaleEntry> {
        debug_assert_eq!(old.id(), new.id());
        self.apply(new.id().unwrap_or_default(), Some(new))
    }

    /// Every key recorded for `id` becomes stale. Only the id is needed,
    /// so a delete never reads the payload.
    pub fn on_delete(&self, id: &str) -> Vec<StaleEntry> {
        self.apply(id, None)
    }

    /// Remove stale entries unless a later write re-added the key.
    /// Returns the number removed.
    pub fn purge(&self, stale: &[StaleEntry]) -> usize {
        let mut removed = 0;
        for entry in stale {
            let mut state = entry.index.write();
            let readded = state
                .forward
                .get(&entry.id)
                .is_some_and(|keys| keys.contains(&entry.key));
            if !readded && state.tree.remove(&entry.key, &entry.id) {
                removed += 1;
            }
        }
        removed
    }

    fn apply(&self, id: &str, doc: Option<&Document>) -> Vec<StaleEntry> {
        let mut stale = Vec::new();
        for index in self.snapshot() {
            let keys = doc.map(|doc| index.keys_for(id, doc, &self.metrics));
            stale.extend(index.replace_keys(id, keys));
        }
        stale
    }

    fn snapshot(&self) -> Vec<Arc<SecondaryIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value, 64).unwrap()
    }

    fn manager_with(def: IndexDefinition) -> IndexManager {
        let manager = IndexManager::new(Arc::new(MetricsRegistry::new()));
        let name = def.name.clone();
        manager.create_index(def).unwrap();
        manager.backfill(&name, Vec::new()).unwrap();
        manager
    }

    fn tags() -> IndexDefinition {
        IndexDefinition::multivalue("by_tag", Extractor::path("$.tags").unwrap())
    }

    #[test]
    fn test_multivalue_entry_per_element() {
        let m = manager_with(tags());
        m.on_insert(&doc(json!({"_id": "p1", "tags": ["a", "b", "c"]})));
        assert_eq!(m.index_entry_count("by_tag").unwrap(), 3);
        let hits = m.lookup("by_tag", &IndexPredicate::eq("b")).unwrap();
        assert!(hits.contains("p1"));
    }

    #[test]
    fn test_update_returns_only_dropped_keys() {
        let m = manager_with(tags());
        let old = doc(json!({"_id": "p1", "tags": ["a", "b", "c"]}));
        let new = doc(json!({"_id": "p1", "tags": ["a", "c", "d"]}));
        m.on_insert(&old);
        let stale = m.on_update(&old, &new);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key(), &IndexKey::from_string("b"));
        // Dropped key lingers until purged
        assert_eq!(m.index_entry_count("by_tag").unwrap(), 4);
        assert_eq!(m.purge(&stale), 1);
        assert_eq!(m.index_entry_count("by_tag").unwrap(), 3);
        assert!(m.lookup("by_tag", &IndexPredicate::eq("b")).unwrap().is_empty());
    }

    #[test]
    fn test_purge_skips_readded_key() {
        let m = manager_with(tags());
        let v1 = doc(json!({"_id": "p1", "tags": ["a"]}));
        let v2 = doc(json!({"_id": "p1", "tags": []}));
        m.on_insert(&v1);
        let stale = m.on_update(&v1, &v2);
        m.on_update(&v2, &v1);
        assert_eq!(m.purge(&stale), 0);
        assert_eq!(m.lookup("by_tag", &IndexPredicate::eq("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_stales_every_key() {
        let m = manager_with(IndexDefinition::scalar("by_type", Extractor::path("$.type").unwrap()));
        let d = doc(json!({"_id": "c1", "type": "customer"}));
        m.on_insert(&d);
        let stale = m.on_delete("c1");
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].index_name(), "by_type");
        m.purge(&stale);
        assert_eq!(m.index_entry_count("by_type").unwrap(), 0);
    }

    #[test]
    fn test_extractor_failure_skips_document() {
        let metrics = Arc::new(MetricsRegistry::new());
        let m = IndexManager::new(Arc::clone(&metrics));
        m.create_index(IndexDefinition::scalar("by_total", Extractor::path("$.total").unwrap()))
            .unwrap();
        m.backfill("by_total", Vec::new()).unwrap();
        m.on_insert(&doc(json!({"_id": "o1", "total": [1, 2]})));
        m.on_insert(&doc(json!({"_id": "o2", "total": 5})));
        assert_eq!(m.index_entry_count("by_total").unwrap(), 1);
        assert_eq!(metrics.snapshot().extractor_skips, 1);
    }

    #[test]
    fn test_backfill_skips_documents_written_during_build() {
        let m = IndexManager::new(Arc::new(MetricsRegistry::new()));
        m.create_index(tags()).unwrap();
        assert!(matches!(
            m.lookup("by_tag", &IndexPredicate::eq("a")),
            Err(IndexError::Building(_))
        ));
        // Concurrent writer lands first with newer content
        m.on_insert(&doc(json!({"_id": "p1", "tags": ["new"]})));
        let snapshot = vec![
            doc(json!({"_id": "p1", "tags": ["old"]})),
            doc(json!({"_id": "p2", "tags": ["old"]})),
        ];
        assert_eq!(m.backfill("by_tag", snapshot).unwrap(), 1);
        let old = m.lookup("by_tag", &IndexPredicate::eq("old")).unwrap();
        assert_eq!(old.into_iter().collect::<Vec<_>>(), vec!["p2"]);
        assert!(m.lookup("by_tag", &IndexPredicate::eq("new")).unwrap().contains("p1"));
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let m = manager_with(tags());
        assert_eq!(m.create_index(tags()), Err(IndexError::AlreadyExists("by_tag".into())));
        assert_eq!(m.drop_index("nope"), Err(IndexError::UnknownIndex("nope".into())));
        m.drop_index("by_tag").unwrap();
        assert!(m.list_indexes().is_empty());
    }

    #[test]
    fn test_accepts_rechecks_document() {
        let m = manager_with(tags());
        let index = m.get("by_tag").unwrap();
        let d = doc(json!({"_id": "p1", "tags": ["x", "y"]}));
        assert!(index.accepts(&d, &IndexPredicate::eq("y")));
        assert!(!index.accepts(&d, &IndexPredicate::eq("z")));
    }
}
