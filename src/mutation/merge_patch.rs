//! Recursive merge-patch
//!
//! Objects in the patch merge into objects in the target, `null` removes a
//! member, and everything else (arrays included) replaces wholesale.

use serde_json::{Map, Value};

use crate::document::{Document, ID_FIELD};

use super::errors::{MutationError, MutationResult};

/// Merge `patch` into `target` in place
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(members) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        merge_members(fields, members);
    }
}

fn merge_members(fields: &mut Map<String, Value>, members: &Map<String, Value>) {
    for (name, value) in members {
        if value.is_null() {
            fields.remove(name);
        } else {
            merge_patch(fields.entry(name.as_str()).or_insert(Value::Null), value);
        }
    }
}

/// Reject patches that are not objects or that would alter `_id`.
/// A patch repeating the current `_id` is accepted.
pub fn validate_patch(doc: &Document, patch: &Value) -> MutationResult<()> {
    let Value::Object(members) = patch else {
        return Err(MutationError::InvalidMutation(
            "merge patch must be an object".to_string(),
        ));
    };
    match members.get(ID_FIELD) {
        None => Ok(()),
        Some(Value::String(id)) if Some(id.as_str()) == doc.id() => Ok(()),
        Some(_) => Err(MutationError::ImmutableKey(ID_FIELD.to_string())),
    }
}

/// The body `doc` would have after the patch
pub fn apply_merge_patch(doc: &Document, patch: &Value) -> MutationResult<Value> {
    validate_patch(doc, patch)?;
    let mut target = doc.to_value();
    merge_patch(&mut target, patch);
    Ok(target)
}
