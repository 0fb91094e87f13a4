//! Canonical JSON encoding and the stable hash built on it.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::IfuError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into pretty-printed JSON with sorted keys and a trailing newline.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, IfuError> {
    let value = serde_json::to_value(value).map_err(|err| IfuError::serde("json_serialize", err))?;
    let mut bytes = serde_json::to_vec_pretty(&canonicalize(value))
        .map_err(|err| IfuError::serde("json_write", err))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// SHA256 of the canonical JSON encoding of `value`, as lowercase hex.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, IfuError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn key_order_does_not_change_the_hash() {
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for (idx, key) in ["frac", "it", "delta", "method"].iter().enumerate() {
            forward.insert(*key, idx);
        }
        for (idx, key) in ["frac", "it", "delta", "method"].iter().enumerate().rev() {
            backward.insert(*key, idx);
        }
        assert_eq!(
            stable_hash_string(&forward).expect("hash"),
            stable_hash_string(&backward).expect("hash")
        );
    }

    #[test]
    fn canonical_bytes_sort_nested_keys() {
        let value = serde_json::json!({"b": {"z": 1, "a": 2}, "a": [ {"y": 0, "x": 1} ]});
        let text = String::from_utf8(to_canonical_json_bytes(&value).expect("json")).expect("utf8");
        assert!(text.find("\"a\"").expect("a") < text.find("\"b\"").expect("b"));
        assert!(text.find("\"x\"").expect("x") < text.find("\"y\"").expect("y"));
        assert!(text.ends_with("}\n"));
    }
}
