//! Shared value types
//!
//! Buckets, object listing entries, object creation options and list queries.

use serde::{Deserialize, Serialize};

// =============================================================================
// Wire Constants
// =============================================================================

/// Default chunk size for new key-value objects
pub const DEFAULT_CHUNK_SIZE: u32 = 4096;

/// Default chunk-map btree order for new key-value objects
pub const DEFAULT_BTREE_ORDER: u32 = 4;

/// Port used when the endpoint does not name one
pub const DEFAULT_EDGEX_PORT: u16 = 3000;

/// Object open flag: replace an existing object
pub const CCOW_O_REPLACE: u32 = 0x01;

/// Object open flag: create the object
pub const CCOW_O_CREATE: u32 = 0x02;

// =============================================================================
// Buckets and Objects
// =============================================================================

/// A bucket as reported by bucket listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "Name")]
    pub name: String,

    /// RFC 3339 creation timestamp
    #[serde(rename = "CreationDate")]
    pub creation_date: String,
}

/// An object as reported by object listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object name relative to its bucket
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "LastModified")]
    pub last_modified: String,

    #[serde(rename = "Size", default)]
    pub size: u64,
}

/// Kind of object to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// Plain stream object
    Object,

    /// Key-value object
    #[default]
    KeyValue,
}

/// Options for object creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOptions {
    pub object_type: ObjectType,
    pub content_type: String,
    pub chunk_size: u32,
    pub btree_order: u32,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            object_type: ObjectType::KeyValue,
            content_type: ListFormat::Json.content_type().to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            btree_order: DEFAULT_BTREE_ORDER,
        }
    }
}

// =============================================================================
// Key-Value Listing
// =============================================================================

/// Serialization format of a key-value listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    #[default]
    Json,
    Csv,
}

impl ListFormat {
    /// MIME type sent as `Content-Type` on list requests
    pub fn content_type(&self) -> &'static str {
        match self {
            ListFormat::Json => "application/json",
            ListFormat::Csv => "text/csv",
        }
    }

    /// Anything mentioning json is JSON, everything else CSV
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.contains("json") {
            ListFormat::Json
        } else {
            ListFormat::Csv
        }
    }
}

/// Parameters of a key-value listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Lower bound (inclusive) on keys
    pub from_key: String,

    /// Keys must start with this prefix; empty matches everything
    pub prefix: String,

    /// Truncate after this many matches; 0 means unbounded
    pub max_count: usize,

    pub format: ListFormat,

    /// Emit `key;value` / `{"k":"v"}` instead of bare keys
    pub include_values: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            from_key: String::new(),
            prefix: String::new(),
            max_count: 0,
            format: ListFormat::Json,
            include_values: true,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_key(mut self, from_key: impl Into<String>) -> Self {
        self.from_key = from_key.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn format(mut self, format: ListFormat) -> Self {
        self.format = format;
        self
    }

    pub fn include_values(mut self, include_values: bool) -> Self {
        self.include_values = include_values;
        self
    }
}
