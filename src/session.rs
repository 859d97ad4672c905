//! Session Manager
//!
//! Session tokens and the caller-owned transaction context.
//!
//! ## Model
//! - The store assigns a token when a staged call first touches an idle
//!   object, and reports it on every staged call after that.
//! - The caller holds a [`Session`] per object and passes it to every
//!   transactional call; the client overwrites its token from each response.
//! - A [`SessionManager`] belongs to one client instance and allows at most
//!   one open `Session` per object. Dropping the `Session` releases the slot.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};
use crate::path::ObjectPath;

/// Opaque session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh, time-ordered token
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wrap a token received from the wire; empty means no session
    pub fn from_wire(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Registry = Arc<Mutex<HashSet<ObjectPath>>>;

/// Tracks which objects have an open session on one client instance
#[derive(Debug, Default)]
pub struct SessionManager {
    active: Registry,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the transaction context for `path`
    ///
    /// Fails with `SessionConflict` while another `Session` for the same
    /// object is alive on this manager.
    pub fn open(&self, path: ObjectPath) -> Result<Session> {
        if !self.active.lock().insert(path.clone()) {
            return Err(EdgeError::SessionConflict(format!(
                "{} already has an open session",
                path
            )));
        }
        tracing::trace!("Session opened for {}", path);
        Ok(Session {
            path,
            token: None,
            registry: Some(Arc::clone(&self.active)),
        })
    }

    /// Whether a `Session` for `path` is currently open
    pub fn is_open(&self, path: &ObjectPath) -> bool {
        self.active.lock().contains(path)
    }

    /// Number of open sessions
    pub fn open_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Caller-owned transaction context for one object
#[derive(Debug)]
pub struct Session {
    path: ObjectPath,
    token: Option<SessionId>,
    registry: Option<Registry>,
}

impl Session {
    /// A context not tracked by any manager
    pub fn detached(path: ObjectPath) -> Self {
        Self {
            path,
            token: None,
            registry: None,
        }
    }

    /// The object this session is bound to
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Current token; `None` when no staged transaction is in progress
    pub fn token(&self) -> Option<&SessionId> {
        self.token.as_ref()
    }

    /// Whether staged mutations may be pending under this session
    pub fn in_transaction(&self) -> bool {
        self.token.is_some()
    }

    /// Overwrite the token with the one reported by the last response
    pub fn update(&mut self, token: Option<SessionId>) {
        if self.token != token {
            tracing::trace!(
                "Session {} token {:?} -> {:?}",
                self.path,
                self.token.as_ref().map(SessionId::as_str),
                token.as_ref().map(SessionId::as_str)
            );
        }
        self.token = token;
    }

    /// Forget the token (after commit, rollback or an immediate write)
    pub fn clear(&mut self) {
        self.update(None);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.lock().remove(&self.path);
        }
    }
}
