//! Shell request handling
//!
//! Each request is a JSON object with an `op` field:
//!
//! ```text
//! {"op":"insert","document":{...}}
//! {"op":"get","id":"CUSTOMER#1"}
//! {"op":"range","prefix":"CUSTOMER#1#"}          // or "start"/"end", or neither
//! {"op":"update","id":"A","merge_patch":{...}}   // or "transform":[...], "replace":{...}
//! {"op":"delete","id":"A"}
//! {"op":"create_index","name":"by_tag","path":"$.tags","multivalue":true}
//! {"op":"drop_index","name":"by_tag"}
//! {"op":"query","index":"by_total","gte":10,"lt":20}   // or "eq", "in", "prefix"
//! {"op":"meta","id":"A"}
//! {"op":"sizes","prefix":"CUSTOMER#"}
//! {"op":"stats"}
//! ```

use std::ops::Bound;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::collection::Collection;
use crate::index::{Extractor, IndexDefinition, IndexPredicate, KeyRange};
use crate::mutation::{Mutation, PathOp};

use super::io::{error_response, ok_response};

const INVALID_REQUEST: &str = "DOCVAULT_INVALID_REQUEST";

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    Insert {
        document: Value,
    },
    Get {
        id: String,
    },
    Range {
        #[serde(flatten)]
        range: RangeSpec,
    },
    Update {
        id: String,
        merge_patch: Option<Value>,
        transform: Option<Vec<PathOp>>,
        replace: Option<Value>,
    },
    Delete {
        id: String,
    },
    CreateIndex {
        name: String,
        path: String,
        #[serde(default)]
        multivalue: bool,
    },
    DropIndex {
        name: String,
    },
    Query {
        index: String,
        eq: Option<Value>,
        #[serde(rename = "in")]
        any_of: Option<Vec<Value>>,
        prefix: Option<String>,
        gt: Option<Value>,
        gte: Option<Value>,
        lt: Option<Value>,
        lte: Option<Value>,
    },
    Meta {
        id: String,
    },
    Sizes {
        #[serde(flatten)]
        range: RangeSpec,
    },
    Stats,
}

#[derive(Debug, Default, Deserialize)]
struct RangeSpec {
    prefix: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl RangeSpec {
    fn to_range(&self) -> Result<KeyRange, String> {
        match (&self.prefix, &self.start, &self.end) {
            (None, None, None) => Ok(KeyRange::All),
            (Some(prefix), None, None) => Ok(KeyRange::prefix(prefix.as_str())),
            (None, Some(start), Some(end)) => Ok(KeyRange::between(start.as_str(), end.as_str())),
            _ => Err("give either prefix, or both start and end".to_string()),
        }
    }
}

/// Either an engine error or a malformed request
enum Failure {
    Engine(crate::Error),
    Request(String),
}

impl From<crate::Error> for Failure {
    fn from(e: crate::Error) -> Self {
        Failure::Engine(e)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Request(message)
    }
}

/// Execute one request line and build its response
pub fn handle_line(collection: &Collection, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return error_response(INVALID_REQUEST, &e.to_string()),
    };
    match execute(collection, request) {
        Ok(data) => ok_response(data),
        Err(Failure::Engine(e)) => error_response(e.code(), &e.to_string()),
        Err(Failure::Request(message)) => error_response(INVALID_REQUEST, &message),
    }
}

fn execute(collection: &Collection, request: Request) -> Result<Value, Failure> {
    match request {
        Request::Insert { document } => {
            let id = collection.insert(document)?;
            Ok(json!({ "id": id }))
        }
        Request::Get { id } => Ok(collection.get(&id)?.into_value()),
        Request::Range { range } => {
            let docs = collection
                .get_range(range.to_range()?)
                .map(|doc| doc.map(|d| d.into_value()))
                .collect::<crate::Result<Vec<_>>>()?;
            Ok(Value::Array(docs))
        }
        Request::Update {
            id,
            merge_patch,
            transform,
            replace,
        } => {
            let mutation = match (merge_patch, transform, replace) {
                (Some(patch), None, None) => Mutation::MergePatch(patch),
                (None, Some(ops), None) => Mutation::Transform(ops),
                (None, None, Some(body)) => Mutation::Replace(body),
                _ => {
                    return Err(Failure::Request(
                        "give exactly one of merge_patch, transform, replace".to_string(),
                    ))
                }
            };
            let outcome = collection.update_traced(&id, mutation)?;
            Ok(json!({
                "document": outcome.document.to_value(),
                "commit": outcome.commit.value(),
                "previous_tier": outcome.previous_tier,
                "tier": outcome.tier,
                "size_bytes": outcome.size_bytes,
                "states": outcome.states,
            }))
        }
        Request::Delete { id } => Ok(json!({ "deleted": collection.delete(&id)? })),
        Request::CreateIndex {
            name,
            path,
            multivalue,
        } => {
            let extractor = Extractor::path(&path).map_err(crate::Error::from)?;
            let definition = IndexDefinition {
                name: name.clone(),
                extractor,
                multivalue,
            };
            let indexed = collection.create_index(definition)?;
            Ok(json!({ "name": name, "indexed": indexed }))
        }
        Request::DropIndex { name } => {
            collection.drop_index(&name)?;
            Ok(json!({ "dropped": name }))
        }
        Request::Query {
            index,
            eq,
            any_of,
            prefix,
            gt,
            gte,
            lt,
            lte,
        } => {
            let predicate = match (eq, any_of, prefix) {
                (Some(v), None, None) => IndexPredicate::Eq(v),
                (None, Some(vs), None) => IndexPredicate::In(vs),
                (None, None, Some(p)) => IndexPredicate::Prefix(p),
                (None, None, None) => IndexPredicate::Range {
                    lower: bound(gte, gt)?,
                    upper: bound(lte, lt)?,
                },
                _ => return Err(Failure::Request("give one of eq, in, prefix, or bounds".to_string())),
            };
            let docs = collection
                .query_by_index(&index, predicate)?
                .map(|doc| doc.map(|d| d.into_value()))
                .collect::<crate::Result<Vec<_>>>()?;
            Ok(Value::Array(docs))
        }
        Request::Meta { id } => Ok(json!(collection.metadata(&id)?)),
        Request::Sizes { range } => {
            let metas: Vec<_> = collection.sizes(range.to_range()?).collect();
            Ok(json!(metas))
        }
        Request::Stats => Ok(json!(collection.stats())),
    }
}

fn bound(inclusive: Option<Value>, exclusive: Option<Value>) -> Result<Bound<Value>, String> {
    match (inclusive, exclusive) {
        (Some(v), None) => Ok(Bound::Included(v)),
        (None, Some(v)) => Ok(Bound::Excluded(v)),
        (None, None) => Ok(Bound::Unbounded),
        (Some(_), Some(_)) => Err("a bound may be inclusive or exclusive, not both".to_string()),
    }
}
