//! Client Module
//!
//! The `KvClient` interface and its two implementations.
//!
//! ## Implementations
//! - [`EdgexClient`]: speaks the S3X wire protocol through a [`Transport`]
//!   (a real endpoint over HTTP, or the loopback store in tests)
//! - [`MockClient`]: calls a local `MemoryStore` directly
//!
//! ## Transactions
//! ```text
//! let mut s = client.open_session("bk1", "o1")?;
//! client.kv_post(&mut s, "k1", "v1", true)?;   // staged, s gets a token
//! client.kv_post(&mut s, "k2", "v2", true)?;   // staged under the same token
//! client.kv_commit(&mut s)?;                   // both visible, token cleared
//! ```
//!
//! [`Transport`]: crate::transport::Transport

mod edgex;
mod mock;

pub use edgex::EdgexClient;
pub use mock::MockClient;

use crate::error::Result;
use crate::path::ObjectPath;
use crate::protocol::KvMap;
use crate::session::{Session, SessionManager};
use crate::types::{Bucket, ListQuery, ObjectEntry, ObjectOptions};

/// Bucket, object and transactional key-value operations
///
/// Mutating key-value calls take the caller's [`Session`] and a `more` flag:
/// `more = true` stages the mutation, `more = false` commits anything staged
/// and applies the mutation immediately. The session token is updated from
/// every transaction-relevant response.
pub trait KvClient: Send + Sync {
    /// Per-client session registry
    fn sessions(&self) -> &SessionManager;

    /// Open the transaction context for `bucket/object`
    ///
    /// Fails with `SessionConflict` while another session for the same
    /// object is open on this client.
    fn open_session(&self, bucket: &str, object: &str) -> Result<Session> {
        self.sessions().open(ObjectPath::new(bucket, object)?)
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    fn bucket_create(&self, bucket: &str) -> Result<()>;

    fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Idempotent
    fn bucket_delete(&self, bucket: &str) -> Result<()>;

    fn bucket_list(&self) -> Result<Vec<Bucket>>;

    // =========================================================================
    // Objects
    // =========================================================================

    fn object_create(&self, bucket: &str, object: &str, options: &ObjectOptions) -> Result<()>;

    fn object_exists(&self, bucket: &str, object: &str) -> Result<bool>;

    /// Idempotent
    fn object_delete(&self, bucket: &str, object: &str) -> Result<()>;

    fn object_list(
        &self,
        bucket: &str,
        from_key: &str,
        prefix: &str,
        max_count: usize,
    ) -> Result<Vec<ObjectEntry>>;

    // =========================================================================
    // Reads (committed state only)
    // =========================================================================

    fn kv_get(&self, bucket: &str, object: &str, key: &str) -> Result<String>;

    fn kv_list(&self, bucket: &str, object: &str, query: &ListQuery) -> Result<String>;

    // =========================================================================
    // Mutations
    // =========================================================================

    fn kv_post(&self, session: &mut Session, key: &str, value: &str, more: bool) -> Result<()>;

    fn kv_post_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()>;

    /// Upsert every pair of a JSON object body
    fn kv_post_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()>;

    /// Upsert every `key;value` line of a CSV body
    fn kv_post_csv(&self, session: &mut Session, csv: &str, more: bool) -> Result<()>;

    /// Deleting an absent key succeeds
    fn kv_delete(&self, session: &mut Session, key: &str, more: bool) -> Result<()>;

    fn kv_delete_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()>;

    /// Delete the keys of a JSON object, or a JSON array of keys
    fn kv_delete_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()>;

    // =========================================================================
    // Transaction Control
    // =========================================================================

    fn kv_commit(&self, session: &mut Session) -> Result<()>;

    fn kv_rollback(&self, session: &mut Session) -> Result<()>;

    /// End the session, committing anything still staged
    fn close(&self, mut session: Session) -> Result<()> {
        if session.in_transaction() {
            self.kv_commit(&mut session)?;
        }
        Ok(())
    }
}
