//! Canonical payload hashing
//!
//! Evidence records and audit events carry a SHA-256 digest over a canonical
//! JSON encoding of the proven payload. Two logically identical payloads must
//! always produce the same digest, so the encoding is pinned here rather than
//! left to serializer defaults:
//!
//! - Object keys are sorted bytewise ascending, recursively.
//! - No insignificant whitespace (`{"a":1,"b":[2,3]}`).
//! - Strings use serde_json's escaping rules.
//! - Integers render without a decimal point; floats use serde_json's
//!   shortest round-trip representation. Payload types in this system stick
//!   to strings and integers, so float formatting never varies in practice.
//! - Array order is significant and preserved.
//!
//! Independent verifiers can re-derive any digest from the stored entity
//! fields with any JSON library that supports key-sorted compact output.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Render a JSON value in the canonical encoding described above.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json's Display for Number is the pinned format
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json::to_string on a &str cannot fail
            out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string()));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// SHA-256 hex digest over the canonical JSON encoding of `payload`.
pub fn hash_payload<T: Serialize>(payload: &T) -> Result<String> {
    let value = serde_json::to_value(payload)
        .map_err(|e| Error::Internal(format!("Failed to serialize payload for hashing: {}", e)))?;
    let canonical = canonical_json(&value);
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{:x}", digest))
}
