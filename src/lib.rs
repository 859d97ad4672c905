//! # EdgeKV
//!
//! Client for S3X key-value object stores with:
//! - Bucket and object lifecycle operations
//! - Staged key-value transactions (stage, commit, rollback, autocommit)
//! - Filtered, paginated key listings in JSON or CSV
//! - An in-memory reference store that speaks the same wire operations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  KvClient (trait)                            │
//! │        EdgexClient (HTTP)        MockClient (direct)         │
//! └──────────────┬───────────────────────────┬──────────────────┘
//!                │                           │
//!                ▼                           │
//!   ┌────────────────────────┐               │
//!   │       Transport        │               │
//!   │  reqwest  │  loopback ─┼───────┐       │
//!   └────────────────────────┘       │       │
//!                                    ▼       ▼
//!                           ┌──────────────────────┐
//!                           │     MemoryStore      │
//!                           │   (single Mutex)     │
//!                           └──────────┬───────────┘
//!                                      │
//!                  ┌───────────────────┼───────────────────┐
//!                  ▼                   ▼                   ▼
//!           ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//!           │  KvObject   │    │ StagingBuffer│    │  Snapshot   │
//!           │ (txn state) │    │  (pending)   │    │   (file)    │
//!           └─────────────┘    └──────────────┘    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod types;
pub mod path;

pub mod protocol;
pub mod query;
pub mod session;
pub mod store;
pub mod transport;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EdgeError, Result};
pub use config::{ClientConfig, SnapshotStrategy, StoreConfig};
pub use types::{Bucket, ListFormat, ListQuery, ObjectEntry, ObjectOptions, ObjectType};
pub use path::ObjectPath;
pub use protocol::{KvMap, KvValue, Mode, Mutation};
pub use session::{Session, SessionId, SessionManager};
pub use store::MemoryStore;
pub use client::{EdgexClient, KvClient, MockClient};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EdgeKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
