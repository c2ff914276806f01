//! Document model
//!
//! A document is a JSON object tree (`serde_json::Value` is the tagged union
//! of object/array/string/number/bool/null). The only structural rule the
//! engine imposes is the top-level `_id` string key. Trees are acyclic by
//! construction; depth is bounded at the construction boundary.

mod path;

pub use path::{JsonPath, PathError, Segment};

use serde_json::{Map, Value};

use crate::codec::{CodecError, CodecResult};

/// Name of the key field
pub const ID_FIELD: &str = "_id";

/// A document with a validated shape
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    body: Map<String, Value>,
}

impl Document {
    /// Validate `value` as a document.
    ///
    /// The `_id` field is optional here; when present it must be a string.
    pub fn from_value(value: Value, max_depth: usize) -> CodecResult<Self> {
        let Value::Object(body) = value else {
            return Err(CodecError::Encoding(format!(
                "document must be an object, got {}",
                type_name(&value)
            )));
        };
        if let Some(id) = body.get(ID_FIELD) {
            if !id.is_string() {
                return Err(CodecError::Encoding(format!(
                    "{} must be a string, got {}",
                    ID_FIELD,
                    type_name(id)
                )));
            }
        }
        let depth = depth_of_map(&body);
        if depth > max_depth {
            return Err(CodecError::Encoding(format!(
                "document nesting depth {} exceeds maximum {}",
                depth, max_depth
            )));
        }
        Ok(Self { body })
    }

    /// Wrap an already-validated body
    pub(crate) fn from_map_unchecked(body: Map<String, Value>) -> Self {
        Self { body }
    }

    /// The `_id` value, if assigned
    pub fn id(&self) -> Option<&str> {
        self.body.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Assign `_id`; only used before first insert
    pub(crate) fn set_id(&mut self, id: String) {
        self.body.insert(ID_FIELD.to_string(), Value::String(id));
    }

    /// Top-level field lookup
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Path lookup returning the first match
    pub fn get_path(&self, path: &JsonPath) -> Option<&Value> {
        path.evaluate_in(&self.body)
    }

    /// Path lookup returning every match
    pub fn get_path_all(&self, path: &JsonPath) -> Vec<&Value> {
        path.evaluate_all_in(&self.body)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    /// Borrowing view as a `Value`, cloning the body
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// JSON type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Nesting depth of a value; scalars are depth 0
pub fn depth_of(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        Value::Object(map) => depth_of_map(map),
        _ => 0,
    }
}

fn depth_of_map(map: &Map<String, Value>) -> usize {
    1 + map.values().map(depth_of).max().unwrap_or(0)
}
