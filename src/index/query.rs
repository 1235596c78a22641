//! Deterministic dedup keys for index queries.

use alloy::primitives::keccak256;
use serde_json::Value;
use std::fmt;

use crate::index::types::IndexQuery;

/// Identifier shared by every request for the same query and variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for a query.
    ///
    /// Whitespace differences in the query text and key order in the
    /// variables do not change the key.
    pub fn for_query(query: &IndexQuery) -> Self {
        let mut material = normalize_query_text(&query.query);
        material.push('\n');
        write_canonical(&query.variables, &mut material);
        Self(keccak256(material.as_bytes()).to_string())
    }

    /// Use a caller-chosen key, for work that is not a plain index query.
    pub fn custom(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse every whitespace run to a single space.
pub fn normalize_query_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Sorted object keys regardless of serde_json's map ordering feature.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
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
        other => out.push_str(&other.to_string()),
    }
}
