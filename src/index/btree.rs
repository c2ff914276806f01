//! BTreeMap-based posting structures for secondary indexes
//!
//! Postings map an index key to the set of document ids carrying it.
//! Both levels are ordered, so lookups are deterministic: keys ascend by
//! value, ids ascend lexicographically.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use serde_json::{Number, Value};

/// A number with an exact total order.
///
/// Integers compare exactly at any width `serde_json` can hold. A float
/// with no fractional part is the same key as the equal integer, so `10`
/// and `10.0` collide while `2^53` and `2^53 + 1` stay apart. The original
/// `Number` is kept for handing back to predicates.
#[derive(Debug, Clone)]
pub struct OrderedNumber {
    value: Numeric,
    raw: Number,
}

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i128),
    /// Finite, with a fractional part or beyond the `i128` range
    Float(f64),
}

/// 2^127 exactly; integral floats below it convert to `i128` losslessly
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl Numeric {
    fn from_number(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            return Some(Numeric::Int(i128::from(i)));
        }
        if let Some(u) = n.as_u64() {
            return Some(Numeric::Int(i128::from(u)));
        }
        let f = n.as_f64()?;
        if !f.is_finite() {
            return None;
        }
        if f.fract() == 0.0 && f.abs() < I128_BOUND {
            // Also folds -0.0 into 0
            return Some(Numeric::Int(f as i128));
        }
        Some(Numeric::Float(f))
    }

    fn cmp_exact(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Numeric::Int(a), Numeric::Int(b)) => a.cmp(&b),
            (Numeric::Float(a), Numeric::Float(b)) => a.total_cmp(&b),
            (Numeric::Int(a), Numeric::Float(b)) => cmp_int_float(a, b),
            (Numeric::Float(a), Numeric::Int(b)) => cmp_int_float(b, a).reverse(),
        }
    }
}

/// Compare an integer with a float that is never equal to any `i128`
fn cmp_int_float(int: i128, float: f64) -> Ordering {
    if float >= I128_BOUND {
        return Ordering::Less;
    }
    if float <= -I128_BOUND {
        return Ordering::Greater;
    }
    // `float` has a fractional part here, so `int` is never equal to it
    if int <= float.floor() as i128 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl OrderedNumber {
    pub fn new(raw: Number) -> Option<Self> {
        let value = Numeric::from_number(&raw)?;
        Some(Self { value, raw })
    }

    pub fn raw(&self) -> &Number {
        &self.raw
    }
}

impl PartialEq for OrderedNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedNumber {}

impl PartialOrd for OrderedNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp_exact(&other.value)
    }
}

/// Index key representing a scalar field value.
///
/// Ordering across types is fixed: Null < Bool < Number < String.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Number(OrderedNumber),
    String(String),
}

impl IndexKey {
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Key for a scalar JSON value. Arrays and objects are not keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => OrderedNumber::new(n.clone()).map(IndexKey::Number),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// The JSON value this key was built from
    pub fn to_json(&self) -> Value {
        match self {
            IndexKey::Null => Value::Null,
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Number(n) => Value::Number(n.raw().clone()),
            IndexKey::String(s) => Value::String(s.clone()),
        }
    }

    /// Whether two keys belong to the same type family
    pub fn same_kind(&self, other: &IndexKey) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IndexKey::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One secondary index's postings
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Add `id` under `key`; returns false if already present
    pub fn insert(&mut self, key: IndexKey, id: &str) -> bool {
        self.tree.entry(key).or_default().insert(id.to_string())
    }

    /// Remove `id` from `key`, dropping the key when it empties.
    /// Returns false if the entry was absent.
    pub fn remove(&mut self, key: &IndexKey, id: &str) -> bool {
        let Some(ids) = self.tree.get_mut(key) else {
            return false;
        };
        let removed = ids.remove(id);
        if ids.is_empty() {
            self.tree.remove(key);
        }
        removed
    }

    /// Ids under exactly `key`, ascending
    pub fn lookup_eq(&self, key: &IndexKey) -> BTreeSet<String> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Ids under keys within the bounds that `accept` also admits
    pub fn scan_range<F>(
        &self,
        lower: Bound<&IndexKey>,
        upper: Bound<&IndexKey>,
        mut accept: F,
    ) -> BTreeSet<String>
    where
        F: FnMut(&IndexKey) -> bool,
    {
        if !is_valid_range(lower, upper) {
            return BTreeSet::new();
        }
        let mut result = BTreeSet::new();
        for (key, ids) in self.tree.range((lower, upper)) {
            if accept(key) {
                result.extend(ids.iter().cloned());
            }
        }
        result
    }

    /// Ids under string keys starting with `prefix`. Matching keys are
    /// contiguous, so the walk stops at the first key past them.
    pub fn scan_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let start = IndexKey::from_string(prefix);
        let mut result = BTreeSet::new();
        for (key, ids) in self.tree.range((Bound::Included(&start), Bound::Unbounded)) {
            match key.as_str() {
                Some(s) if s.starts_with(prefix) => result.extend(ids.iter().cloned()),
                _ => break,
            }
        }
        result
    }

    /// Ids under any key accepted by `accept`, ascending
    pub fn scan<F>(&self, mut accept: F) -> BTreeSet<String>
    where
        F: FnMut(&IndexKey) -> bool,
    {
        let mut result = BTreeSet::new();
        for (key, ids) in &self.tree {
            if accept(key) {
                result.extend(ids.iter().cloned());
            }
        }
        result
    }

    /// Number of (key, id) entries
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(|ids| ids.len()).sum()
    }
}

/// `BTreeMap::range` panics on inverted or empty-excluded bounds
fn is_valid_range(lower: Bound<&IndexKey>, upper: Bound<&IndexKey>) -> bool {
    match (lower, upper) {
        (Bound::Excluded(lo), Bound::Excluded(hi)) => lo < hi,
        (Bound::Included(lo) | Bound::Excluded(lo), Bound::Included(hi) | Bound::Excluded(hi)) => {
            lo <= hi
        }
        _ => true,
    }
}
