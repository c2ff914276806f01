//! Path-transform operations
//!
//! An ordered list of edits addressed by [`JsonPath`]. Operations apply in
//! order to one working copy, so later operations see earlier effects.
//! Validation happens up front; an error during application discards the
//! working copy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::document::{type_name, Document, JsonPath, Segment, ID_FIELD};

use super::errors::{MutationError, MutationResult};

/// One path-transform operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathOp {
    /// Write `value` at `path`, creating missing parent objects
    Set { path: JsonPath, value: Value },
    /// Delete the member or element at `path`; absent is a no-op
    Remove { path: JsonPath },
    /// Push onto the array at `path`
    Append { path: JsonPath, value: Value },
    /// Insert at the front of the array at `path`
    Prepend { path: JsonPath, value: Value },
    /// Move an object member to a sibling name
    Rename { path: JsonPath, to: String },
    /// Add to the number at `path`; absent starts from zero
    Increment { path: JsonPath, by: Number },
}

impl PathOp {
    pub fn set(path: &str, value: impl Into<Value>) -> MutationResult<Self> {
        Ok(PathOp::Set {
            path: JsonPath::parse(path)?,
            value: value.into(),
        })
    }

    pub fn remove(path: &str) -> MutationResult<Self> {
        Ok(PathOp::Remove {
            path: JsonPath::parse(path)?,
        })
    }

    pub fn append(path: &str, value: impl Into<Value>) -> MutationResult<Self> {
        Ok(PathOp::Append {
            path: JsonPath::parse(path)?,
            value: value.into(),
        })
    }

    pub fn prepend(path: &str, value: impl Into<Value>) -> MutationResult<Self> {
        Ok(PathOp::Prepend {
            path: JsonPath::parse(path)?,
            value: value.into(),
        })
    }

    pub fn rename(path: &str, to: impl Into<String>) -> MutationResult<Self> {
        Ok(PathOp::Rename {
            path: JsonPath::parse(path)?,
            to: to.into(),
        })
    }

    pub fn increment(path: &str, by: impl Into<Number>) -> MutationResult<Self> {
        Ok(PathOp::Increment {
            path: JsonPath::parse(path)?,
            by: by.into(),
        })
    }

    pub fn path(&self) -> &JsonPath {
        match self {
            PathOp::Set { path, .. }
            | PathOp::Remove { path }
            | PathOp::Append { path, .. }
            | PathOp::Prepend { path, .. }
            | PathOp::Rename { path, .. }
            | PathOp::Increment { path, .. } => path,
        }
    }

    /// Lower-case operation name
    pub fn name(&self) -> &'static str {
        match self {
            PathOp::Set { .. } => "set",
            PathOp::Remove { .. } => "remove",
            PathOp::Append { .. } => "append",
            PathOp::Prepend { .. } => "prepend",
            PathOp::Rename { .. } => "rename",
            PathOp::Increment { .. } => "increment",
        }
    }

    /// Checks that need no document: target shape and `_id` protection
    pub fn validate(&self) -> MutationResult<()> {
        let path = self.path();
        if path.is_root() {
            return Err(MutationError::InvalidMutation(format!(
                "{} cannot target the document root",
                self.name()
            )));
        }
        if path.has_wildcard() {
            return Err(MutationError::InvalidMutation(format!(
                "{} path {} must address a single location",
                self.name(),
                path
            )));
        }
        if path.first_field() == Some(ID_FIELD) {
            return Err(MutationError::ImmutableKey(ID_FIELD.to_string()));
        }
        match self {
            PathOp::Rename { path, to } => {
                if !matches!(path.segments().last(), Some(Segment::Field(_))) {
                    return Err(MutationError::InvalidMutation(format!(
                        "rename path {} must end in a field name",
                        path
                    )));
                }
                if path.segments().len() == 1 && to == ID_FIELD {
                    return Err(MutationError::ImmutableKey(ID_FIELD.to_string()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Apply to `root` in place
    fn apply(&self, root: &mut Value) -> MutationResult<()> {
        match self {
            PathOp::Set { path, value } => set_at(root, path, value.clone()),
            PathOp::Remove { path } => {
                remove_at(root, path);
                Ok(())
            }
            PathOp::Append { path, value } => push_at(root, path, value.clone(), End::Back),
            PathOp::Prepend { path, value } => push_at(root, path, value.clone(), End::Front),
            PathOp::Rename { path, to } => rename_at(root, path, to),
            PathOp::Increment { path, by } => increment_at(root, path, by),
        }
    }
}

/// Body `doc` would have after `ops`
pub fn apply_transform(doc: &Document, ops: &[PathOp]) -> MutationResult<Value> {
    for op in ops {
        op.validate()?;
    }
    let mut root = doc.to_value();
    for op in ops {
        op.apply(&mut root)?;
    }
    Ok(root)
}

enum End {
    Front,
    Back,
}

fn set_at(root: &mut Value, path: &JsonPath, value: Value) -> MutationResult<()> {
    let Some((parent_path, last)) = path.split_last() else {
        return Err(MutationError::InvalidMutation("cannot set the document root".into()));
    };
    let parent = ensure_container(root, parent_path.segments(), path)?;
    match (last, parent) {
        (Segment::Field(name), Value::Object(fields)) => {
            fields.insert(name.clone(), value);
            Ok(())
        }
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => {
            items[*i] = value;
            Ok(())
        }
        (Segment::Index(i), Value::Array(items)) if *i == items.len() => {
            items.push(value);
            Ok(())
        }
        (Segment::Last, Value::Array(items)) if !items.is_empty() => {
            let end = items.len() - 1;
            items[end] = value;
            Ok(())
        }
        (_, parent) => Err(MutationError::InvalidMutation(format!(
            "cannot set {} on {}",
            path,
            type_name(parent)
        ))),
    }
}

fn remove_at(root: &mut Value, path: &JsonPath) {
    let Some((parent_path, last)) = path.split_last() else {
        return;
    };
    let Some(parent) = lookup_mut(root, parent_path.segments()) else {
        return;
    };
    match (last, parent) {
        (Segment::Field(name), Value::Object(fields)) => {
            fields.remove(name);
        }
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => {
            items.remove(*i);
        }
        (Segment::Last, Value::Array(items)) => {
            items.pop();
        }
        _ => {}
    }
}

fn push_at(root: &mut Value, path: &JsonPath, value: Value, end: End) -> MutationResult<()> {
    match lookup_mut(root, path.segments()) {
        Some(Value::Array(items)) => {
            match end {
                End::Back => items.push(value),
                End::Front => items.insert(0, value),
            }
            Ok(())
        }
        Some(other) => Err(MutationError::NotAnArray {
            path: path.to_string(),
            found: type_name(other),
        }),
        None => set_at(root, path, Value::Array(vec![value])),
    }
}

fn rename_at(root: &mut Value, path: &JsonPath, to: &str) -> MutationResult<()> {
    let Some((parent_path, Segment::Field(from))) = path.split_last() else {
        return Err(MutationError::InvalidMutation(format!(
            "rename path {} must end in a field name",
            path
        )));
    };
    if let Some(Value::Object(fields)) = lookup_mut(root, parent_path.segments()) {
        if let Some(value) = fields.remove(from) {
            fields.insert(to.to_string(), value);
        }
    }
    Ok(())
}

fn increment_at(root: &mut Value, path: &JsonPath, by: &Number) -> MutationResult<()> {
    let sum = match lookup_mut(root, path.segments()) {
        None => by.clone(),
        Some(Value::Number(current)) => add_numbers(current, by)?,
        Some(other) => {
            return Err(MutationError::InvalidMutation(format!(
                "cannot increment {} at {}",
                type_name(other),
                path
            )))
        }
    };
    set_at(root, path, Value::Number(sum))
}

/// Integer arithmetic while it fits, floating point otherwise
fn add_numbers(a: &Number, b: &Number) -> MutationResult<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN);
    Number::from_f64(sum)
        .ok_or_else(|| MutationError::InvalidMutation("increment overflowed to a non-finite number".into()))
}

fn lookup_mut<'a>(root: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.as_object_mut()?.get_mut(name)?,
            Segment::Index(i) => current.as_array_mut()?.get_mut(*i)?,
            Segment::Last => current.as_array_mut()?.last_mut()?,
            Segment::Wildcard => return None,
        };
    }
    Some(current)
}

/// Walk `segments`, creating empty objects for missing fields
fn ensure_container<'a>(
    root: &'a mut Value,
    segments: &[Segment],
    full: &JsonPath,
) -> MutationResult<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        let found = type_name(current);
        let no_route = || {
            MutationError::InvalidMutation(format!(
                "cannot reach {} through {} at {}",
                full, found, segment
            ))
        };
        current = match segment {
            Segment::Field(name) => match current {
                Value::Object(fields) => fields
                    .entry(name.as_str())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => return Err(no_route()),
            },
            Segment::Index(i) => match current {
                Value::Array(items) => items.get_mut(*i).ok_or_else(no_route)?,
                _ => return Err(no_route()),
            },
            Segment::Last => match current {
                Value::Array(items) => items.last_mut().ok_or_else(no_route)?,
                _ => return Err(no_route()),
            },
            Segment::Wildcard => return Err(no_route()),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value, 64).unwrap()
    }

    fn run(value: Value, ops: Vec<PathOp>) -> MutationResult<Value> {
        apply_transform(&doc(value), &ops)
    }

    #[test]
    fn test_set_creates_parents() {
        let out = run(
            json!({"_id": "a"}),
            vec![PathOp::set("$.shipping.address.city", "Oslo").unwrap()],
        )
        .unwrap();
        assert_eq!(out, json!({"_id": "a", "shipping": {"address": {"city": "Oslo"}}}));
    }

    #[test]
    fn test_set_array_positions() {
        let out = run(
            json!({"_id": "a", "t": [1, 2]}),
            vec![
                PathOp::set("$.t[0]", 9).unwrap(),
                PathOp::set("$.t[2]", 3).unwrap(),
                PathOp::set("$.t[last]", 4).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(out["t"], json!([9, 2, 4]));
        assert!(matches!(
            run(json!({"_id": "a", "t": []}), vec![PathOp::set("$.t[3]", 1).unwrap()]),
            Err(MutationError::InvalidMutation(_))
        ));
    }

    #[test]
    fn test_ops_reach_through_array_elements() {
        let out = run(
            json!({"_id": "o", "lines": [{"sku": "x", "qty": 1}, {"sku": "y"}]}),
            vec![
                PathOp::set("$.lines[0].qty", 5).unwrap(),
                PathOp::increment("$.lines[last].qty", 2).unwrap(),
                PathOp::append("$.lines[0].notes", "gift").unwrap(),
                PathOp::set("$.lines[1].meta.source", "web").unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(
            out["lines"],
            json!([
                {"sku": "x", "qty": 5, "notes": ["gift"]},
                {"sku": "y", "qty": 2, "meta": {"source": "web"}}
            ])
        );

        assert!(matches!(
            run(json!({"_id": "o", "lines": []}), vec![PathOp::set("$.lines[0].qty", 1).unwrap()]),
            Err(MutationError::InvalidMutation(_))
        ));
        assert!(matches!(
            run(json!({"_id": "o", "n": 3}), vec![PathOp::set("$.n.inner", 1).unwrap()]),
            Err(MutationError::InvalidMutation(_))
        ));
        assert!(matches!(
            run(json!({"_id": "o", "lines": {}}), vec![PathOp::set("$.lines[last].qty", 1).unwrap()]),
            Err(MutationError::InvalidMutation(_))
        ));
    }

    #[test]
    fn test_later_ops_see_earlier_effects() {
        let out = run(
            json!({"_id": "a"}),
            vec![
                PathOp::append("$.tags", "x").unwrap(),
                PathOp::append("$.tags", "y").unwrap(),
                PathOp::prepend("$.tags", "w").unwrap(),
                PathOp::remove("$.tags[1]").unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(out["tags"], json!(["w", "y"]));
    }

    #[test]
    fn test_append_to_non_array_rejects_whole_list() {
        let err = run(
            json!({"_id": "a", "name": "n"}),
            vec![
                PathOp::set("$.x", 1).unwrap(),
                PathOp::append("$.name", "z").unwrap(),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MutationError::NotAnArray {
                path: "$.name".into(),
                found: "string"
            }
        );
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let out = run(
            json!({"_id": "a", "b": 1}),
            vec![PathOp::remove("$.c.d").unwrap(), PathOp::remove("$.b[0]").unwrap()],
        )
        .unwrap();
        assert_eq!(out, json!({"_id": "a", "b": 1}));
    }

    #[test]
    fn test_rename_and_increment() {
        let out = run(
            json!({"_id": "a", "qty": 2, "old": true}),
            vec![
                PathOp::rename("$.old", "new").unwrap(),
                PathOp::increment("$.qty", 3).unwrap(),
                PathOp::increment("$.views", 1).unwrap(),
                PathOp::increment("$.qty", Number::from_f64(0.5).unwrap()).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(out, json!({"_id": "a", "qty": 5.5, "new": true, "views": 1}));
        assert!(matches!(
            run(json!({"_id": "a", "s": "x"}), vec![PathOp::increment("$.s", 1).unwrap()]),
            Err(MutationError::InvalidMutation(_))
        ));
    }

    #[test]
    fn test_id_and_root_are_protected() {
        let id = ID_FIELD.to_string();
        assert_eq!(PathOp::set("$._id", "x").unwrap().validate(), Err(MutationError::ImmutableKey(id.clone())));
        assert_eq!(PathOp::remove("$._id").unwrap().validate(), Err(MutationError::ImmutableKey(id.clone())));
        assert_eq!(PathOp::rename("$.a", "_id").unwrap().validate(), Err(MutationError::ImmutableKey(id)));
        assert!(PathOp::rename("$.a.b", "_id").unwrap().validate().is_ok());
        assert!(matches!(
            PathOp::remove("$").unwrap().validate(),
            Err(MutationError::InvalidMutation(_))
        ));
        assert!(matches!(
            PathOp::set("$.tags[*]", 1).unwrap().validate(),
            Err(MutationError::InvalidMutation(_))
        ));
    }

    #[test]
    fn test_ops_deserialize_from_json() {
        let ops: Vec<PathOp> = serde_json::from_value(json!([
            {"op": "set", "path": "$.a.b", "value": 1},
            {"op": "append", "path": "$.tags", "value": "x"},
            {"op": "increment", "path": "$.n", "by": 2}
        ]))
        .unwrap();
        assert_eq!(ops[0], PathOp::set("$.a.b", 1).unwrap());
        assert_eq!(ops[2].name(), "increment");
    }
}
