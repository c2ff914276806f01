//! Document codec
//!
//! Compact binary form of a document tree:
//!
//! ```text
//! +-----------+---------+------------------+------------------+
//! | Magic 'D' | Version | Value (tagged)   | CRC32 (u32 LE)   |
//! +-----------+---------+------------------+------------------+
//! ```
//!
//! Value tags:
//!
//! ```text
//! 0x00 null | 0x01 false | 0x02 true
//! 0x03 i64  | 0x04 u64   | 0x05 f64       (8 bytes LE)
//! 0x06 string  (u32 LE length + UTF-8)
//! 0x07 array   (u32 LE count + values)
//! 0x08 object  (u32 LE count + (u32 LE key length, key, value)*)
//! ```
//!
//! Object keys are written in ascending byte order, so encoding is
//! deterministic for a logical document. Array order is preserved.

mod checksum;
mod errors;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{CodecError, CodecResult};

use serde_json::{Map, Number, Value};

use crate::document::Document;

const MAGIC: u8 = b'D';
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 2;
const TRAILER_LEN: usize = 4;

/// Bound on decode recursion; payloads nest far less than this in practice
const MAX_DECODE_DEPTH: usize = 1024;

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_I64: u8 = 0x03;
const TAG_U64: u8 = 0x04;
const TAG_F64: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_ARRAY: u8 = 0x07;
const TAG_OBJECT: u8 = 0x08;

/// Encode a document to its binary form
pub fn encode(document: &Document) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len_map(document.as_map()));
    buf.push(MAGIC);
    buf.push(FORMAT_VERSION);
    write_map(&mut buf, document.as_map())?;
    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Decode a binary payload back into a document
pub fn decode(bytes: &[u8]) -> CodecResult<Document> {
    if bytes.len() < HEADER_LEN + 1 + TRAILER_LEN {
        return Err(CodecError::CorruptPayload(format!(
            "payload too short: {} bytes",
            bytes.len()
        )));
    }
    let body_end = bytes.len() - TRAILER_LEN;
    let stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    if !verify_checksum(&bytes[..body_end], stored) {
        return Err(CodecError::CorruptPayload(format!(
            "checksum mismatch: stored {:08x}",
            stored
        )));
    }
    if bytes[0] != MAGIC {
        return Err(CodecError::CorruptPayload(format!(
            "bad magic byte {:#04x}",
            bytes[0]
        )));
    }
    if bytes[1] != FORMAT_VERSION {
        return Err(CodecError::CorruptPayload(format!(
            "unsupported format version {}",
            bytes[1]
        )));
    }

    let mut reader = Reader {
        data: &bytes[HEADER_LEN..body_end],
        pos: 0,
    };
    let value = reader.read_value(0)?;
    if reader.pos != reader.data.len() {
        return Err(CodecError::CorruptPayload(format!(
            "{} trailing bytes after document",
            reader.data.len() - reader.pos
        )));
    }
    match value {
        Value::Object(map) => Ok(Document::from_map_unchecked(map)),
        _ => Err(CodecError::CorruptPayload(
            "top-level value is not an object".to_string(),
        )),
    }
}

/// Exact encoded size of a document, computed without encoding it
pub fn size(document: &Document) -> usize {
    HEADER_LEN + encoded_len_map(document.as_map()) + TRAILER_LEN
}

/// Encoded size of a single value (tag included, header/trailer excluded)
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 1 + 8,
        Value::String(s) => 1 + 4 + s.len(),
        Value::Array(items) => 1 + 4 + items.iter().map(encoded_len).sum::<usize>(),
        Value::Object(map) => encoded_len_map(map),
    }
}

fn encoded_len_map(map: &Map<String, Value>) -> usize {
    1 + 4
        + map
            .iter()
            .map(|(k, v)| 4 + k.len() + encoded_len(v))
            .sum::<usize>()
}

fn write_len(buf: &mut Vec<u8>, len: usize, what: &str) -> CodecResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::Encoding(format!("{} length {} exceeds u32", what, len)))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> CodecResult<()> {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(false) => buf.push(TAG_FALSE),
        Value::Bool(true) => buf.push(TAG_TRUE),
        Value::Number(n) => write_number(buf, n)?,
        Value::String(s) => {
            buf.push(TAG_STRING);
            write_len(buf, s.len(), "string")?;
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            write_len(buf, items.len(), "array")?;
            for item in items {
                write_value(buf, item)?;
            }
        }
        Value::Object(map) => write_map(buf, map)?,
    }
    Ok(())
}

fn write_number(buf: &mut Vec<u8>, n: &Number) -> CodecResult<()> {
    if let Some(i) = n.as_i64() {
        buf.push(TAG_I64);
        buf.extend_from_slice(&i.to_le_bytes());
    } else if let Some(u) = n.as_u64() {
        buf.push(TAG_U64);
        buf.extend_from_slice(&u.to_le_bytes());
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| CodecError::Encoding(format!("unrepresentable number {}", n)))?;
        if !f.is_finite() {
            return Err(CodecError::Encoding(format!("non-finite number {}", f)));
        }
        buf.push(TAG_F64);
        buf.extend_from_slice(&f.to_bits().to_le_bytes());
    }
    Ok(())
}

fn write_map(buf: &mut Vec<u8>, map: &Map<String, Value>) -> CodecResult<()> {
    buf.push(TAG_OBJECT);
    write_len(buf, map.len(), "object")?;
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    for (key, value) in entries {
        write_len(buf, key.len(), "key")?;
        buf.extend_from_slice(key.as_bytes());
        write_value(buf, value)?;
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                CodecError::CorruptPayload(format!(
                    "truncated: need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.data.len() - self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CodecResult<usize> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    fn read_8(&mut self) -> CodecResult<[u8; 8]> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(out)
    }

    fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_u32()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::CorruptPayload(format!("invalid UTF-8: {}", e)))
    }

    fn read_value(&mut self, depth: usize) -> CodecResult<Value> {
        if depth > MAX_DECODE_DEPTH {
            return Err(CodecError::CorruptPayload(
                "nesting exceeds decode limit".to_string(),
            ));
        }
        let tag = self.read_u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_I64 => Value::from(i64::from_le_bytes(self.read_8()?)),
            TAG_U64 => Value::from(u64::from_le_bytes(self.read_8()?)),
            TAG_F64 => {
                let f = f64::from_bits(u64::from_le_bytes(self.read_8()?));
                let n = Number::from_f64(f).ok_or_else(|| {
                    CodecError::CorruptPayload(format!("non-finite number {}", f))
                })?;
                Value::Number(n)
            }
            TAG_STRING => Value::String(self.read_string()?),
            TAG_ARRAY => {
                let count = self.read_u32()?;
                // Every element takes at least one byte
                if count > self.data.len() - self.pos {
                    return Err(CodecError::CorruptPayload(format!(
                        "array count {} exceeds remaining payload",
                        count
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                Value::Array(items)
            }
            TAG_OBJECT => {
                let count = self.read_u32()?;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = self.read_string()?;
                    let value = self.read_value(depth + 1)?;
                    if map.insert(key.clone(), value).is_some() {
                        return Err(CodecError::CorruptPayload(format!(
                            "duplicate object key '{}'",
                            key
                        )));
                    }
                }
                Value::Object(map)
            }
            other => {
                return Err(CodecError::CorruptPayload(format!(
                    "unknown tag {:#04x} at offset {}",
                    other,
                    self.pos - 1
                )))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value, 64).unwrap()
    }

    #[test]
    fn test_round_trip_mixed_document() {
        let d = doc(json!({
            "_id": "CUSTOMER#1#ORDER#1",
            "type": "order",
            "total": 10.5,
            "qty": -3,
            "big": u64::MAX,
            "paid": true,
            "note": null,
            "lines": [{"sku": "a", "n": 1}, [], "x"],
            "ünïcode": "日本"
        }));
        let bytes = encode(&d).unwrap();
        assert_eq!(decode(&bytes).unwrap(), d);
    }

    #[test]
    fn test_size_matches_encoded_length() {
        let d = doc(json!({"_id": "k", "a": [1, 2.5, "three"], "b": {"c": null}}));
        assert_eq!(size(&d), encode(&d).unwrap().len());
    }

    #[test]
    fn test_encoding_is_deterministic_across_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": 2, "_id": "x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"_id": "x", "a": 2, "b": 1}"#).unwrap();
        assert_eq!(encode(&doc(a)).unwrap(), encode(&doc(b)).unwrap());
    }

    #[test]
    fn test_array_order_preserved() {
        let d = doc(json!({"tags": ["c", "a", "b"]}));
        let back = decode(&encode(&d).unwrap()).unwrap();
        assert_eq!(back.get("tags"), Some(&json!(["c", "a", "b"])));
    }

    #[test]
    fn test_checksum_failure_is_corruption() {
        let mut bytes = encode(&doc(json!({"_id": "k", "v": 1}))).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_payload_is_corruption() {
        assert!(decode(&[]).unwrap_err().is_corruption());
        assert!(decode(&[MAGIC, FORMAT_VERSION]).unwrap_err().is_corruption());
    }

    #[test]
    fn test_well_checksummed_garbage_is_corruption() {
        let mut bytes = vec![MAGIC, FORMAT_VERSION, 0x7F];
        let checksum = compute_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
    }

    #[test]
    fn test_non_object_root_is_corruption() {
        let mut bytes = vec![MAGIC, FORMAT_VERSION, TAG_NULL];
        let checksum = compute_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        assert!(decode(&bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_oversized_array_count_is_corruption() {
        let mut bytes = vec![MAGIC, FORMAT_VERSION, TAG_OBJECT, 1, 0, 0, 0, 1, 0, 0, 0, b'a'];
        bytes.push(TAG_ARRAY);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let checksum = compute_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        assert!(decode(&bytes).unwrap_err().is_corruption());
    }
}
