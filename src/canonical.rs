//! Canonical JSON serialization (spec.md §4.1).
//!
//! Produces a byte-for-byte identical encoding for equal structured values:
//! object keys sorted by Unicode code point, array order preserved, only
//! exact integers in `[-(2^53-1), 2^53-1]`, no absent/undefined fields
//! (callers must not hand us optional fields they haven't stripped), `null`
//! permitted. Used wherever a hash must be deterministic across peers: sid
//! derivation, transcript records, commit hashes, idempotency equality.

use crate::hash::sha256;
use crate::hexbytes::Hex32;
use serde::Serialize;
use serde_json::Value;

const MAX_SAFE_INT: i64 = (1i64 << 53) - 1;
const MIN_SAFE_INT: i64 = -MAX_SAFE_INT;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CanonicalError {
    #[error("number {0} is outside the safe integer range")]
    UnsafeInteger(String),
    #[error("non-integer number {0} cannot be canonicalized")]
    NonIntegerNumber(String),
    #[error("serialization failed: {0}")]
    Serde(String),
}

/// Serialize `value` to its canonical JSON byte representation.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let json = serde_json::to_value(value).map_err(|e| CanonicalError::Serde(e.to_string()))?;
    canonicalize_value(&json)
}

/// Serialize `value` to its canonical JSON string representation.
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    canonical_bytes(value).map(|bytes| String::from_utf8(bytes).expect("canonical output is UTF-8"))
}

/// Hash the canonical encoding of `value` with SHA-256.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<Hex32, CanonicalError> {
    canonical_bytes(value).map(|bytes| sha256(&bytes))
}

fn canonicalize_value(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => {
            out.extend_from_slice(b"null");
            Ok(())
        }
        Value::Bool(b) => {
            out.extend_from_slice(if *b { b"true" } else { b"false" });
            Ok(())
        }
        Value::Number(n) => write_number(n, out),
        Value::String(s) => {
            write_json_string(s, out);
            Ok(())
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
            Ok(())
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_value(&map[*key], out)?;
            }
            out.push(b'}');
            Ok(())
        }
    }
}

fn write_number(n: &serde_json::Number, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        if !(MIN_SAFE_INT..=MAX_SAFE_INT).contains(&i) {
            return Err(CanonicalError::UnsafeInteger(n.to_string()));
        }
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }

    if let Some(u) = n.as_u64() {
        if u > MAX_SAFE_INT as u64 {
            return Err(CanonicalError::UnsafeInteger(n.to_string()));
        }
        out.extend_from_slice(u.to_string().as_bytes());
        return Ok(());
    }

    Err(CanonicalError::NonIntegerNumber(n.to_string()))
}

/// Minimal JSON string escaping; canonical form does not require any
/// particular escaping beyond producing valid, unambiguous JSON, but we keep
/// it deterministic (always escape the same way).
fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let value = json!({"b": 1, "a": 2});
        let bytes = canonicalize_value(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn array_order_is_preserved() {
        let value = json!([3, 1, 2]);
        let bytes = canonicalize_value(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[3,1,2]");
    }

    #[test]
    fn round_trip_is_idempotent() {
        let value = json!({"z": [1, 2, {"y": true, "x": null}], "a": "hello"});
        let once = canonicalize_value(&value).unwrap();
        let twice = canonicalize_value(&serde_json::from_slice(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_unsafe_integers() {
        let value = json!({"n": 2f64.powi(53) as i64 + 1});
        let err = canonicalize_value(&value).unwrap_err();
        assert!(matches!(err, CanonicalError::UnsafeInteger(_)));
    }

    #[test]
    fn rejects_non_integer_numbers() {
        let value = json!({"n": 1.5});
        let err = canonicalize_value(&value).unwrap_err();
        assert!(matches!(err, CanonicalError::NonIntegerNumber(_)));
    }

    #[test]
    fn nested_object_key_order_does_not_affect_hash() {
        let a = json!({"outer": {"b": 1, "a": 2}});
        let b = json!({"outer": {"a": 2, "b": 1}});
        assert_eq!(
            canonical_hash(&a).unwrap(),
            canonical_hash(&b).unwrap()
        );
    }
}
