//! Document Fingerprints - Canonical JSON + SHA-256
//!
//! Two documents with the same content hash the same regardless of key order
//! in the file they came from.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::templates::TemplateDoc;

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&sorted(serde_json::to_value(value)?))
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// `sha256(canonical_json(doc))`, hex encoded.
pub fn document_fingerprint(doc: &TemplateDoc) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(doc)?.as_bytes()))
}
