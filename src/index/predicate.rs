//! Predicates evaluated against secondary index keys

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use serde_json::Value;

use super::btree::{IndexKey, IndexTree};

/// Signature of a custom key predicate
pub type MatchFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Selection over an index's keys.
///
/// On a multivalue index every predicate is an "any element" test, so
/// `Eq(x)` is array-contains.
#[derive(Clone)]
pub enum IndexPredicate {
    /// Key equals the value
    Eq(Value),
    /// Key equals any of the values
    In(Vec<Value>),
    /// Key within bounds (values must be scalars)
    Range { lower: Bound<Value>, upper: Bound<Value> },
    /// String key starting with the prefix
    Prefix(String),
    /// Arbitrary test on the key's JSON value; scans every key
    Matches(Arc<MatchFn>),
}

impl IndexPredicate {
    pub fn eq(value: impl Into<Value>) -> Self {
        IndexPredicate::Eq(value.into())
    }

    /// `lower <= key < upper`
    pub fn between(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        IndexPredicate::Range {
            lower: Bound::Included(lower.into()),
            upper: Bound::Excluded(upper.into()),
        }
    }

    pub fn at_least(lower: impl Into<Value>) -> Self {
        IndexPredicate::Range {
            lower: Bound::Included(lower.into()),
            upper: Bound::Unbounded,
        }
    }

    pub fn less_than(upper: impl Into<Value>) -> Self {
        IndexPredicate::Range {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(upper.into()),
        }
    }

    pub fn matches<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        IndexPredicate::Matches(Arc::new(f))
    }

    /// Ids whose keys may satisfy the predicate
    pub fn candidates(&self, tree: &IndexTree) -> BTreeSet<String> {
        match self {
            IndexPredicate::Eq(v) => match IndexKey::from_json(v) {
                Some(key) => tree.lookup_eq(&key),
                None => BTreeSet::new(),
            },
            IndexPredicate::In(values) => values
                .iter()
                .filter_map(IndexKey::from_json)
                .flat_map(|key| tree.lookup_eq(&key))
                .collect(),
            IndexPredicate::Range { lower, upper } => {
                let (Some(lower), Some(upper)) = (key_bound(lower), key_bound(upper)) else {
                    return BTreeSet::new();
                };
                tree.scan_range(lower.as_ref(), upper.as_ref(), |k| {
                    same_kind_as_bounds(k, &lower, &upper)
                })
            }
            IndexPredicate::Prefix(prefix) => tree.scan_prefix(prefix),
            IndexPredicate::Matches(_) => tree.scan(|k| self.accepts(k)),
        }
    }

    /// Whether a single key satisfies the predicate
    pub fn accepts(&self, key: &IndexKey) -> bool {
        match self {
            IndexPredicate::Eq(v) => IndexKey::from_json(v).as_ref() == Some(key),
            IndexPredicate::In(values) => values
                .iter()
                .any(|v| IndexKey::from_json(v).as_ref() == Some(key)),
            IndexPredicate::Range { lower, upper } => {
                let (Some(lower), Some(upper)) = (key_bound(lower), key_bound(upper)) else {
                    return false;
                };
                let above = match &lower {
                    Bound::Included(lo) => key >= lo,
                    Bound::Excluded(lo) => key > lo,
                    Bound::Unbounded => true,
                };
                let below = match &upper {
                    Bound::Included(hi) => key <= hi,
                    Bound::Excluded(hi) => key < hi,
                    Bound::Unbounded => true,
                };
                above && below && same_kind_as_bounds(key, &lower, &upper)
            }
            IndexPredicate::Prefix(prefix) => key
                .as_str()
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            IndexPredicate::Matches(f) => f(&key.to_json()),
        }
    }

    /// Whether any of a document's keys satisfies the predicate
    pub fn accepts_any(&self, keys: &BTreeSet<IndexKey>) -> bool {
        keys.iter().any(|k| self.accepts(k))
    }
}

/// Convert a value bound to a key bound; `None` if the value is not a scalar
fn key_bound(bound: &Bound<Value>) -> Option<Bound<IndexKey>> {
    match bound {
        Bound::Included(v) => IndexKey::from_json(v).map(Bound::Included),
        Bound::Excluded(v) => IndexKey::from_json(v).map(Bound::Excluded),
        Bound::Unbounded => Some(Bound::Unbounded),
    }
}

/// Range predicates never cross type families: `>= 10` matches numbers only
fn same_kind_as_bounds(key: &IndexKey, lower: &Bound<IndexKey>, upper: &Bound<IndexKey>) -> bool {
    [lower, upper].into_iter().all(|bound| match bound {
        Bound::Included(b) | Bound::Excluded(b) => key.same_kind(b),
        Bound::Unbounded => true,
    })
}

impl fmt::Debug for IndexPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPredicate::Eq(v) => write!(f, "Eq({})", v),
            IndexPredicate::In(vs) => write!(f, "In({:?})", vs),
            IndexPredicate::Range { lower, upper } => {
                write!(f, "Range({:?}, {:?})", lower, upper)
            }
            IndexPredicate::Prefix(p) => write!(f, "Prefix({:?})", p),
            IndexPredicate::Matches(_) => write!(f, "Matches(..)"),
        }
    }
}
