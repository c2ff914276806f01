//! Index extractors: pure functions from a document to the value(s) an
//! index is keyed on.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::{type_name, Document, JsonPath, PathError};

use super::btree::IndexKey;

/// Signature of a custom extractor. `Ok(None)` means "field not present".
pub type ExtractFn = dyn Fn(&Document) -> Result<Option<Value>, String> + Send + Sync;

/// How an index derives its value from a document
#[derive(Clone)]
pub enum Extractor {
    /// Value at a JSON path; wildcard paths yield every match
    Path(JsonPath),
    /// Arbitrary pure function
    Function(Arc<ExtractFn>),
}

impl Extractor {
    pub fn path(path: &str) -> Result<Self, PathError> {
        Ok(Extractor::Path(JsonPath::parse(path)?))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Document) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        Extractor::Function(Arc::new(f))
    }

    /// Run the extractor
    pub fn extract(&self, doc: &Document) -> Result<Option<Value>, String> {
        match self {
            Extractor::Path(path) if path.has_wildcard() => {
                let matches = doc.get_path_all(path);
                if matches.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::Array(matches.into_iter().cloned().collect())))
                }
            }
            Extractor::Path(path) => Ok(doc.get_path(path).cloned()),
            Extractor::Function(f) => f(doc),
        }
    }

    /// Index keys for `doc`.
    ///
    /// A scalar index takes exactly one scalar. A multivalue index takes one
    /// key per scalar array element (nested containers are skipped); a bare
    /// scalar counts as a one-element array. A missing value yields no keys.
    pub fn keys(&self, doc: &Document, multivalue: bool) -> Result<BTreeSet<IndexKey>, String> {
        let Some(value) = self.extract(doc)? else {
            return Ok(BTreeSet::new());
        };
        let mut keys = BTreeSet::new();
        match (&value, multivalue) {
            (Value::Array(items), true) => {
                keys.extend(items.iter().filter_map(IndexKey::from_json));
            }
            (Value::Array(_) | Value::Object(_), false) => {
                return Err(format!(
                    "scalar index cannot key on {}",
                    type_name(&value)
                ));
            }
            (Value::Object(_), true) => {
                return Err("multivalue index cannot key on object".to_string());
            }
            (scalar, _) => {
                if let Some(key) = IndexKey::from_json(scalar) {
                    keys.insert(key);
                }
            }
        }
        Ok(keys)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Path(path) => write!(f, "Path({})", path),
            Extractor::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Path(path) => write!(f, "{}", path),
            Extractor::Function(_) => write!(f, "<function>"),
        }
    }
}
