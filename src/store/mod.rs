//! Store Module
//!
//! In-memory reference store for buckets and key-value objects.
//!
//! ## Responsibilities
//! - Bucket and object lifecycle
//! - Per-object staging buffers and the commit/rollback state machine
//! - Read-committed gets and listings
//! - Optional snapshot persistence of committed state
//!
//! ## Object Transaction States
//! ```text
//!            stage (more = true)
//!   ┌──────┐ ─────────────────────▶ ┌─────────┐
//!   │ Idle │                        │ Staging │ ◀─┐ stage
//!   └──────┘ ◀───────────────────── └─────────┘ ──┘
//!       ▲     commit / rollback /        │
//!       │     immediate (more = false)   │
//!       └────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! One `parking_lot::Mutex` guards the whole store. Every operation, reads
//! included, holds it only for the in-memory work (plus the snapshot write
//! under `SnapshotStrategy::EveryWrite`).

mod staging;
mod object;
mod snapshot;
mod memory;

pub use staging::{StagedEntry, StagingBuffer};
pub use object::{KvObject, TxnState};
pub use snapshot::{ObjectRecord, Snapshot};
pub use memory::MemoryStore;
