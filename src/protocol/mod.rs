//! Protocol Module
//!
//! Logical operations and payload formats shared by the clients, the
//! loopback transport and the store.
//!
//! ## Mutations
//! - Upsert: key + value
//! - Delete: key
//!
//! ## Batch Payloads
//! ```text
//! JSON:  {"k1": "v1", "k2": {"nested": 1}}     values: string or any JSON
//! CSV:   k1;v1\nk2;v2                           one pair per line
//! ```
//!
//! ## Listings (XML)
//! - `ListAllMyBucketsResult` / `ListBucketResult` for bucket and object lists
//! - `Error` bodies carrying a machine-readable code on failures
//!
//! ## Transaction Flags
//! ```text
//! x-ccow-autocommit=0    stage (more = true)
//! x-ccow-autocommit=1    apply now, committing anything staged first
//! finalize               end of a logical transaction
//! cancel=1               discard staged mutations
//! x-session-id           session token, request and response header
//! ```

mod mutation;
mod payload;
mod listing;

pub use mutation::{Mode, Mutation};
pub use payload::{
    decode_csv_upserts, decode_json_deletes, decode_json_upserts, encode_map, map_deletes,
    map_upserts, pairs_to_csv, pairs_to_json, KvMap, KvValue,
};
pub use listing::{
    decode_bucket_list, decode_error, decode_object_list, encode_bucket_list, encode_error,
    encode_object_list, ErrorBody, ErrorCode,
};

// =============================================================================
// Wire Names
// =============================================================================

/// Session token header (request and response)
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Autocommit query flag: `0` stages, `1` applies immediately
pub const AUTOCOMMIT_PARAM: &str = "x-ccow-autocommit";

/// Marks the end of a logical transaction
pub const FINALIZE_PARAM: &str = "finalize";

/// Discards staged mutations
pub const CANCEL_PARAM: &str = "cancel";

/// Object creation headers
pub const OBJECT_OFLAGS_HEADER: &str = "x-ccow-object-oflags";
pub const BTREE_ORDER_HEADER: &str = "x-ccow-chunkmap-btree-order";
pub const CHUNK_SIZE_HEADER: &str = "x-ccow-chunkmap-chunk-size";

/// `comp` values selecting the sub-resource of an object
pub const COMP_KV: &str = "kv";
pub const COMP_KV_GET: &str = "kvget";
pub const COMP_STREAM_SESSION: &str = "streamsession";
pub const COMP_DELETE: &str = "del";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_CSV: &str = "text/csv";
pub const CONTENT_TYPE_OCTET: &str = "application/octet-stream";
pub const CONTENT_TYPE_XML: &str = "application/xml";
