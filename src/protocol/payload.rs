//! Batch payload codec
//!
//! Decoding of JSON/CSV batch bodies into mutations, and encoding of
//! key-value maps and pairs into request bodies.
//!
//! Every decoder parses the whole payload before returning, so a malformed
//! body yields an error and no mutations at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EdgeError, Result};
use super::Mutation;

// =============================================================================
// Values
// =============================================================================

/// A value in a key-value map payload
///
/// The committed set stores strings only. `Text` and JSON strings are
/// stored verbatim, any other `Json` value as its compact JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KvValue {
    Text(String),
    Json(Value),
}

impl KvValue {
    /// The string the committed set will hold for this value
    pub fn encode(&self) -> Result<String> {
        match self {
            KvValue::Text(text) | KvValue::Json(Value::String(text)) => Ok(text.clone()),
            KvValue::Json(value) => Ok(serde_json::to_string(value)?),
        }
    }
}

impl From<&str> for KvValue {
    fn from(text: &str) -> Self {
        KvValue::Text(text.to_string())
    }
}

impl From<String> for KvValue {
    fn from(text: String) -> Self {
        KvValue::Text(text)
    }
}

impl From<Value> for KvValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => KvValue::Text(text),
            other => KvValue::Json(other),
        }
    }
}

/// Key-value map payload, ordered by key
pub type KvMap = BTreeMap<String, KvValue>;

// =============================================================================
// Map Payloads
// =============================================================================

/// Upserts for every entry of a map
pub fn map_upserts(map: &KvMap) -> Result<Vec<Mutation>> {
    map.iter()
        .map(|(key, value)| Ok(Mutation::upsert(key.as_str(), value.encode()?)))
        .collect()
}

/// Deletes for every key of a map (values are ignored)
pub fn map_deletes(map: &KvMap) -> Vec<Mutation> {
    map.keys().map(|key| Mutation::delete(key.as_str())).collect()
}

/// JSON body for a map payload
pub fn encode_map(map: &KvMap) -> Result<String> {
    Ok(serde_json::to_string(map)?)
}

// =============================================================================
// JSON Payloads
// =============================================================================

/// Decode a JSON object body into upserts
///
/// String values are stored verbatim; any other JSON value is stored as its
/// compact JSON text.
pub fn decode_json_upserts(body: &str) -> Result<Vec<Mutation>> {
    let object = parse_object(body)?;
    object
        .into_iter()
        .map(|(key, value)| Ok(Mutation::upsert(key, KvValue::from(value).encode()?)))
        .collect()
}

/// Decode a JSON delete body into deletes
///
/// Accepts an object (its keys are deleted, values ignored) or an array of
/// key strings.
pub fn decode_json_deletes(body: &str) -> Result<Vec<Mutation>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Object(object) => Ok(object.into_iter().map(|(key, _)| Mutation::delete(key)).collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(key) => Ok(Mutation::delete(key)),
                other => Err(EdgeError::Encoding(format!(
                    "Delete list entries must be strings, got `{}`",
                    other
                ))),
            })
            .collect(),
        other => Err(EdgeError::Encoding(format!(
            "Expected a JSON object or array, got `{}`",
            other
        ))),
    }
}

fn parse_object(body: &str) -> Result<serde_json::Map<String, Value>> {
    if body.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Object(object) => Ok(object),
        other => Err(EdgeError::Encoding(format!(
            "Expected a JSON object, got `{}`",
            other
        ))),
    }
}

// =============================================================================
// CSV Payloads
// =============================================================================

/// Decode a `key;value` per line body into upserts
///
/// Blank lines are skipped and a trailing `\r` is dropped. The value is
/// everything after the first `;`. A non-blank line without `;` or with an
/// empty key fails the whole payload.
pub fn decode_csv_upserts(body: &str) -> Result<Vec<Mutation>> {
    let mut mutations = Vec::new();

    for (index, line) in body.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = line.split_once(';').ok_or_else(|| {
            EdgeError::Encoding(format!("CSV line {}: missing `;` separator", index + 1))
        })?;

        if key.is_empty() {
            return Err(EdgeError::Encoding(format!("CSV line {}: empty key", index + 1)));
        }

        mutations.push(Mutation::upsert(key, value));
    }

    Ok(mutations)
}

// =============================================================================
// Pair Helpers
// =============================================================================

/// `{"k1":"v1","k2":"v2"}` from key/value pairs (later duplicates win)
pub fn pairs_to_json(pairs: &[(&str, &str)]) -> String {
    let object: serde_json::Map<String, Value> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect();
    Value::Object(object).to_string()
}

/// `k1;v1\nk2;v2` from key/value pairs
pub fn pairs_to_csv(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{};{}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}
