//! Collection Invariant Tests
//!
//! - Key uniqueness and immutability
//! - Prefix and half-open range scans
//! - Merge-patch and path-transform semantics through the façade
//! - All-or-nothing writes

use docvault::{Collection, EngineConfig, Error, KeyRange, Mutation, PathOp};
use serde_json::{json, Value};

fn collection() -> Collection {
    Collection::new(EngineConfig::default()).unwrap()
}

fn ids(docs: impl Iterator<Item = docvault::Result<docvault::Document>>) -> Vec<String> {
    docs.map(|d| d.unwrap().id().unwrap().to_string()).collect()
}

// =============================================================================
// Key Uniqueness and Immutability
// =============================================================================

/// A second insert with a taken `_id` fails and leaves the first intact.
#[test]
fn test_duplicate_key_rejected() {
    let c = collection();
    assert_eq!(c.insert(json!({"_id": "k", "v": 1})).unwrap(), "k");
    let err = c.insert(json!({"_id": "k", "v": 2})).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(ref id) if id == "k"));
    assert!(err.is_retryable());
    assert_eq!(c.get("k").unwrap().get("v"), Some(&json!(1)));
}

/// Every mutation mode refuses to change `_id`; the document is unchanged.
#[test]
fn test_id_is_immutable() {
    let c = collection();
    c.insert(json!({"_id": "k", "v": 1})).unwrap();
    let attempts = vec![
        Mutation::MergePatch(json!({"_id": "other"})),
        Mutation::MergePatch(json!({"_id": null})),
        Mutation::Transform(vec![PathOp::set("$._id", "other").unwrap()]),
        Mutation::Transform(vec![PathOp::remove("$._id").unwrap()]),
        Mutation::Transform(vec![PathOp::rename("$.v", "_id").unwrap()]),
        Mutation::Replace(json!({"_id": "other", "v": 9})),
    ];
    for mutation in attempts {
        let err = c.update("k", mutation).unwrap_err();
        assert_eq!(err.code(), "DOCVAULT_IMMUTABLE_KEY");
    }
    assert_eq!(c.get("k").unwrap().into_value(), json!({"_id": "k", "v": 1}));
}

/// Repeating the current `_id` in a patch is not a change.
#[test]
fn test_patch_with_same_id_allowed() {
    let c = collection();
    c.insert(json!({"_id": "k", "v": 1})).unwrap();
    let doc = c.update("k", Mutation::MergePatch(json!({"_id": "k", "v": 2}))).unwrap();
    assert_eq!(doc.get("v"), Some(&json!(2)));
}

/// Non-object documents and non-string ids are encoding errors, counted as rejections.
#[test]
fn test_invalid_documents_rejected() {
    let c = collection();
    assert_eq!(c.insert(json!([1, 2])).unwrap_err().code(), "DOCVAULT_ENCODING_ERROR");
    assert_eq!(c.insert(json!({"_id": 7})).unwrap_err().code(), "DOCVAULT_ENCODING_ERROR");
    assert_eq!(c.metrics().rejected_writes, 2);
    assert_eq!(c.count(KeyRange::All), 0);
}

// =============================================================================
// Range Scans
// =============================================================================

/// `range("A#")` yields exactly the A ids, ascending.
#[test]
fn test_prefix_range() {
    let c = collection();
    for id in ["B#1", "A#2", "A#1"] {
        c.insert(json!({"_id": id})).unwrap();
    }
    assert_eq!(ids(c.get_prefix("A#")), vec!["A#1", "A#2"]);
    assert_eq!(ids(c.get_prefix("B#")), vec!["B#1"]);
    assert!(ids(c.get_prefix("C#")).is_empty());
    assert_eq!(c.count(KeyRange::All), 3);
}

/// `between(lo, hi)` is half-open.
#[test]
fn test_half_open_range() {
    let c = collection();
    for id in ["a", "b", "c", "d"] {
        c.insert(json!({"_id": id})).unwrap();
    }
    assert_eq!(ids(c.get_range(KeyRange::between("b", "d"))), vec!["b", "c"]);
    assert!(ids(c.get_range(KeyRange::between("d", "b"))).is_empty());
}

/// The key index knows nothing about delimiters.
#[test]
fn test_keys_are_delimiter_agnostic() {
    let c = collection();
    for id in ["user/1/post/1", "user/1/post/2", "user/10/post/1", "user|1"] {
        c.insert(json!({"_id": id})).unwrap();
    }
    assert_eq!(ids(c.get_prefix("user/1/")), vec!["user/1/post/1", "user/1/post/2"]);
}

/// Re-running a range is a fresh sequence as of the new call.
#[test]
fn test_range_is_restartable() {
    let c = collection();
    c.insert(json!({"_id": "A#1"})).unwrap();
    let first = c.get_prefix("A#");
    c.insert(json!({"_id": "A#2"})).unwrap();
    assert_eq!(ids(first), vec!["A#1"]);
    assert_eq!(ids(c.get_prefix("A#")), vec!["A#1", "A#2"]);
}

/// Deleted documents disappear from later scans.
#[test]
fn test_delete_hides_from_range() {
    let c = collection();
    c.insert(json!({"_id": "A#1"})).unwrap();
    c.insert(json!({"_id": "A#2"})).unwrap();
    assert!(c.delete("A#1").unwrap());
    assert_eq!(ids(c.get_prefix("A#")), vec!["A#2"]);
    assert!(c.get("A#1").unwrap_err().is_not_found());
}

// =============================================================================
// Mutations
// =============================================================================

/// `{"a": null}` onto `{"a": 1, "b": 2}` yields `{"b": 2}`.
#[test]
fn test_merge_patch_null_removal() {
    let c = collection();
    c.insert(json!({"_id": "k", "a": 1, "b": 2})).unwrap();
    let doc = c.update("k", Mutation::MergePatch(json!({"a": null}))).unwrap();
    assert_eq!(doc.into_value(), json!({"_id": "k", "b": 2}));
}

/// Later operations see earlier ones within one call.
#[test]
fn test_transform_applies_in_order() {
    let c = collection();
    c.insert(json!({"_id": "k"})).unwrap();
    let doc = c
        .update(
            "k",
            Mutation::Transform(vec![
                PathOp::set("$.cart.items", json!([])).unwrap(),
                PathOp::append("$.cart.items", json!({"sku": "x", "qty": 1})).unwrap(),
                PathOp::increment("$.cart.items[0].qty", 2).unwrap(),
                PathOp::prepend("$.cart.items", json!({"sku": "y", "qty": 1})).unwrap(),
            ]),
        )
        .unwrap();
    assert_eq!(
        doc.get("cart").cloned(),
        Some(json!({"items": [{"sku": "y", "qty": 1}, {"sku": "x", "qty": 3}]}))
    );
}

/// A failing operation discards every earlier operation in the list.
#[test]
fn test_transform_is_all_or_nothing() {
    let c = collection();
    c.insert(json!({"_id": "k", "name": "n"})).unwrap();
    let err = c
        .update(
            "k",
            Mutation::Transform(vec![
                PathOp::set("$.x", 1).unwrap(),
                PathOp::append("$.name", "z").unwrap(),
            ]),
        )
        .unwrap_err();
    assert_eq!(err.code(), "DOCVAULT_NOT_AN_ARRAY");
    assert_eq!(c.get("k").unwrap().into_value(), json!({"_id": "k", "name": "n"}));
}

/// Replace swaps the body but keeps `_id`.
#[test]
fn test_replace() {
    let c = collection();
    c.insert(json!({"_id": "k", "a": 1})).unwrap();
    c.update("k", Mutation::Replace(json!({"b": 2}))).unwrap();
    assert_eq!(c.get("k").unwrap().into_value(), json!({"_id": "k", "b": 2}));
}

/// Updates beyond the nesting bound are rejected.
#[test]
fn test_nesting_bound_enforced_on_update() {
    let c = Collection::new(EngineConfig::default().with_max_nesting_depth(3)).unwrap();
    c.insert(json!({"_id": "k"})).unwrap();
    let err = c
        .update("k", Mutation::MergePatch(json!({"a": {"b": {"c": {"d": 1}}}})))
        .unwrap_err();
    assert_eq!(err.code(), "DOCVAULT_ENCODING_ERROR");
}

// =============================================================================
// Scenarios
// =============================================================================

/// Customer and order share one collection; the order range finds one.
#[test]
fn test_scenario_ecommerce_lookup() {
    let c = collection();
    let customer = json!({"_id": "CUSTOMER#1", "type": "customer", "name": "A"});
    let order = json!({"_id": "CUSTOMER#1#ORDER#1", "type": "order", "total": 10});
    c.insert(customer).unwrap();
    c.insert(order.clone()).unwrap();

    assert_eq!(c.get("CUSTOMER#1#ORDER#1").unwrap().into_value(), order);
    let orders: Vec<Value> = c
        .get_prefix("CUSTOMER#1#ORDER#")
        .map(|d| d.unwrap().into_value())
        .collect();
    assert_eq!(orders, vec![order]);
    assert_eq!(c.count(KeyRange::prefix("CUSTOMER#1")), 2);
}

/// An oversize insert fails and reserves nothing.
#[test]
fn test_scenario_size_limit() {
    let c = Collection::new(
        EngineConfig::default()
            .with_inline_threshold(100)
            .with_max_document_bytes(1000),
    )
    .unwrap();
    let big = "x".repeat(2000);
    let err = c.insert(json!({"_id": "doc", "blob": big})).unwrap_err();
    assert_eq!(err.code(), "DOCVAULT_DOCUMENT_TOO_LARGE");
    assert!(c.get("doc").unwrap_err().is_not_found());

    c.insert(json!({"_id": "doc", "blob": "small"})).unwrap();
    let err = c
        .update("doc", Mutation::MergePatch(json!({"blob": "y".repeat(2000)})))
        .unwrap_err();
    assert_eq!(err.code(), "DOCVAULT_DOCUMENT_TOO_LARGE");
    assert_eq!(c.get("doc").unwrap().get("blob"), Some(&json!("small")));
}

/// `insert_many` stops at the first failure; earlier inserts remain.
#[test]
fn test_insert_many_stops_at_failure() {
    let c = collection();
    let err = c
        .insert_many(vec![json!({"_id": "a"}), json!({"_id": "a"}), json!({"_id": "b"})])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));
    assert!(c.get("a").is_ok());
    assert!(c.get("b").is_err());
}

/// Deleting an absent id is a no-op that reports false.
#[test]
fn test_delete_is_idempotent() {
    let c = collection();
    assert!(!c.delete("ghost").unwrap());
    c.insert(json!({"_id": "k"})).unwrap();
    assert!(c.delete("k").unwrap());
    assert!(!c.delete("k").unwrap());
    assert_eq!(c.metrics().deletes, 1);
}
