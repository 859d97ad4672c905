//! Query/List Engine
//!
//! Filtered, sorted, paginated views over a committed key-value set.
//!
//! ## Algorithm
//! 1. Walk keys in ascending lexicographic order starting at `from_key`
//! 2. Keep keys starting with `prefix` (empty prefix keeps everything)
//! 3. Stop after `max_count` matches (0 = unbounded)
//! 4. Render as JSON or CSV, with or without values
//!
//! ## Output Shapes
//! ```text
//! JSON + values:   {"k1":"v1","k2":"v2"}
//! JSON keys-only:  ["k1","k2"]
//! CSV + values:    k1;v1\nk2;v2
//! CSV keys-only:   k1\nk2
//! ```

use std::collections::BTreeMap;
use std::ops::Bound;

use serde_json::Value;

use crate::error::{EdgeError, Result};
use crate::types::{ListFormat, ListQuery};

/// A listed key, with its value when values were requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub value: Option<String>,
}

/// Apply the `from_key` / `prefix` / `max_count` window to sorted entries
///
/// `entries` must already be in ascending key order.
pub fn window<'a, T, I>(entries: I, from_key: &str, prefix: &str, max_count: usize) -> Vec<(&'a str, T)>
where
    I: IntoIterator<Item = (&'a str, T)>,
{
    let limit = if max_count == 0 { usize::MAX } else { max_count };
    entries
        .into_iter()
        .filter(|(key, _)| *key >= from_key)
        .filter(|(key, _)| prefix.is_empty() || key.starts_with(prefix))
        .take(limit)
        .collect()
}

/// Select matching entries of a committed set in key order
pub fn select<'a>(
    committed: &'a BTreeMap<String, String>,
    from_key: &str,
    prefix: &str,
    max_count: usize,
) -> Vec<(&'a str, &'a str)> {
    let range = committed
        .range::<str, _>((Bound::Included(from_key), Bound::Unbounded))
        .map(|(key, value)| (key.as_str(), value.as_str()));
    window(range, from_key, prefix, max_count)
}

/// Render selected entries
pub fn render(entries: &[(&str, &str)], format: ListFormat, include_values: bool) -> String {
    match (format, include_values) {
        (ListFormat::Json, true) => {
            let object: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .collect();
            Value::Object(object).to_string()
        }
        (ListFormat::Json, false) => {
            let keys: Vec<Value> = entries
                .iter()
                .map(|(key, _)| Value::String(key.to_string()))
                .collect();
            Value::Array(keys).to_string()
        }
        (ListFormat::Csv, true) => entries
            .iter()
            .map(|(key, value)| format!("{};{}", key, value))
            .collect::<Vec<_>>()
            .join("\n"),
        (ListFormat::Csv, false) => entries
            .iter()
            .map(|(key, _)| *key)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Select and render in one step
pub fn list(committed: &BTreeMap<String, String>, query: &ListQuery) -> String {
    let entries = select(committed, &query.from_key, &query.prefix, query.max_count);
    render(&entries, query.format, query.include_values)
}

/// Parse a rendered listing back into entries, preserving order
pub fn parse(body: &str, format: ListFormat, include_values: bool) -> Result<Vec<ListEntry>> {
    match format {
        ListFormat::Json => parse_json(body),
        ListFormat::Csv => Ok(parse_csv(body, include_values)),
    }
}

fn parse_json(body: &str) -> Result<Vec<ListEntry>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Object(object) => object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(value) => Ok(ListEntry { key, value: Some(value) }),
                Value::Null => Ok(ListEntry { key, value: None }),
                other => Ok(ListEntry {
                    key,
                    value: Some(other.to_string()),
                }),
            })
            .collect(),
        Value::Array(keys) => keys
            .into_iter()
            .map(|key| match key {
                Value::String(key) => Ok(ListEntry { key, value: None }),
                other => Err(EdgeError::Encoding(format!("Expected a key string, got `{}`", other))),
            })
            .collect(),
        other => Err(EdgeError::Encoding(format!(
            "Expected a JSON object or array listing, got `{}`",
            other
        ))),
    }
}

fn parse_csv(body: &str, include_values: bool) -> Vec<ListEntry> {
    body.split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            if include_values {
                match line.split_once(';') {
                    Some((key, value)) => ListEntry {
                        key: key.to_string(),
                        value: Some(value.to_string()),
                    },
                    None => ListEntry {
                        key: line.to_string(),
                        value: None,
                    },
                }
            } else {
                ListEntry {
                    key: line.to_string(),
                    value: None,
                }
            }
        })
        .collect()
}
