//! Shell Request Tests
//!
//! Drives the JSON-lines shell end to end: one request per line in, one
//! response envelope per line out.

use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use docvault::cli::shell;
use docvault::EngineConfig;
use serde_json::{json, Value};

fn session(config: EngineConfig, requests: &[Value]) -> Vec<Value> {
    let input: String = requests.iter().map(|r| format!("{}\n", r)).collect();
    let mut out = Vec::new();
    shell(config, Cursor::new(input), &mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_document_lifecycle() {
    let r = session(
        EngineConfig::default(),
        &[
            json!({"op": "insert", "document": {"_id": "CUSTOMER#1", "name": "Ada"}}),
            json!({"op": "insert", "document": {"_id": "CUSTOMER#1#ORDER#1", "total": 10}}),
            json!({"op": "insert", "document": {"_id": "CUSTOMER#2", "name": "Bob"}}),
            json!({"op": "range", "prefix": "CUSTOMER#1"}),
            json!({"op": "update", "id": "CUSTOMER#1", "merge_patch": {"name": null, "vip": true}}),
            json!({"op": "get", "id": "CUSTOMER#1"}),
            json!({"op": "delete", "id": "CUSTOMER#1"}),
            json!({"op": "get", "id": "CUSTOMER#1"}),
            json!({"op": "range", "start": "CUSTOMER#", "end": "CUSTOMER#2"}),
        ],
    );
    assert_eq!(r.len(), 9);
    assert!(r[..3].iter().all(|resp| resp["status"] == "ok"));
    assert_eq!(r[3]["data"].as_array().unwrap().len(), 2);

    assert_eq!(r[4]["data"]["document"], json!({"_id": "CUSTOMER#1", "vip": true}));
    assert_eq!(
        r[4]["data"]["states"],
        json!(["RECEIVED", "VALIDATED", "APPLIED", "INDEXED", "COMMITTED"])
    );
    assert_eq!(r[4]["data"]["tier"], "INLINE");

    assert_eq!(r[5]["data"]["vip"], true);
    assert_eq!(r[6]["data"]["deleted"], true);
    assert_eq!(r[7]["code"], "DOCVAULT_NOT_FOUND");
    let ids: Vec<&str> = r[8]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["CUSTOMER#1#ORDER#1"]);
}

#[test]
fn test_transform_request() {
    let r = session(
        EngineConfig::default(),
        &[
            json!({"op": "insert", "document": {"_id": "A", "tags": ["x"], "n": 1}}),
            json!({"op": "update", "id": "A", "transform": [
                {"op": "append", "path": "$.tags", "value": "y"},
                {"op": "increment", "path": "$.n", "by": 2},
                {"op": "rename", "path": "$.n", "to": "count"}
            ]}),
            json!({"op": "update", "id": "A", "transform": [
                {"op": "set", "path": "$._id", "value": "B"}
            ]}),
            json!({"op": "update", "id": "A", "transform": [
                {"op": "append", "path": "$.count", "value": 1}
            ]}),
        ],
    );
    assert_eq!(
        r[1]["data"]["document"],
        json!({"_id": "A", "tags": ["x", "y"], "count": 3})
    );
    assert_eq!(r[2]["code"], "DOCVAULT_IMMUTABLE_KEY");
    assert_eq!(r[3]["code"], "DOCVAULT_NOT_AN_ARRAY");
}

#[test]
fn test_index_requests() {
    let r = session(
        EngineConfig::default(),
        &[
            json!({"op": "insert", "document": {"_id": "O1", "total": 5, "tags": ["a"]}}),
            json!({"op": "insert", "document": {"_id": "O2", "total": 15, "tags": ["a", "b"]}}),
            json!({"op": "insert", "document": {"_id": "O3", "total": 25, "tags": ["b"]}}),
            json!({"op": "create_index", "name": "by_total", "path": "$.total"}),
            json!({"op": "create_index", "name": "by_tag", "path": "$.tags", "multivalue": true}),
            json!({"op": "query", "index": "by_total", "gte": 10, "lt": 25}),
            json!({"op": "query", "index": "by_tag", "eq": "b"}),
            json!({"op": "query", "index": "by_tag", "in": ["a", "b"]}),
            json!({"op": "create_index", "name": "by_tag", "path": "$.tags"}),
            json!({"op": "drop_index", "name": "by_tag"}),
            json!({"op": "query", "index": "by_tag", "eq": "a"}),
        ],
    );
    assert_eq!(r[3]["data"]["indexed"], 3);
    let ids = |resp: &Value| -> Vec<String> {
        resp["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["_id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids(&r[5]), vec!["O2"]);
    assert_eq!(ids(&r[6]), vec!["O2", "O3"]);
    assert_eq!(ids(&r[7]), vec!["O1", "O2", "O3"]);
    assert_eq!(r[8]["code"], "DOCVAULT_INDEX_EXISTS");
    assert_eq!(r[9]["status"], "ok");
    assert_eq!(r[10]["code"], "DOCVAULT_UNKNOWN_INDEX");
}

#[test]
fn test_metadata_and_stats() {
    let config = EngineConfig::default().with_inline_threshold(64);
    let big = "x".repeat(200);
    let r = session(
        config,
        &[
            json!({"op": "insert", "document": {"_id": "small"}}),
            json!({"op": "insert", "document": {"_id": "large", "blob": big}}),
            json!({"op": "meta", "id": "large"}),
            json!({"op": "sizes"}),
            json!({"op": "stats"}),
        ],
    );
    assert_eq!(r[2]["data"]["tier"], "OUT_OF_LINE");
    let sizes = r[3]["data"].as_array().unwrap();
    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes[1]["id"], "small");
    assert_eq!(sizes[1]["tier"], "INLINE");
    assert_eq!(r[4]["data"]["documents"], 2);
    assert_eq!(r[4]["data"]["metrics"]["inserts"], 2);
}

#[test]
fn test_malformed_requests_do_not_end_session() {
    let input = "not json\n{\"op\":\"frobnicate\"}\n\
                 {\"op\":\"update\",\"id\":\"a\"}\n\
                 {\"op\":\"range\",\"start\":\"a\"}\n\
                 {\"op\":\"stats\"}\n";
    let mut out = Vec::new();
    shell(EngineConfig::default(), Cursor::new(input), &mut out).unwrap();
    let r: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(r.len(), 5);
    for resp in &r[..4] {
        assert_eq!(resp["code"], "DOCVAULT_INVALID_REQUEST");
    }
    assert_eq!(r[4]["status"], "ok");
}

/// The binary's stdout carries responses only; log lines go to stderr
#[test]
fn test_binary_stdout_is_protocol_only() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_docvault"))
        .arg("shell")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"{\"op\":\"insert\",\"document\":{\"_id\":\"a\"}}\n{\"op\":\"get\",\"id\":\"a\"}\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line["status"], "ok");
        assert!(line.get("event").is_none());
    }
    assert_eq!(lines[1]["data"]["_id"], "a");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("COLLECTION_OPENED"));
}
