//! Key-value object
//!
//! Committed key-value set plus the staging buffer and session of the
//! transaction in progress, if any.

use std::collections::BTreeMap;

use crate::protocol::{Mode, Mutation};
use crate::session::SessionId;

use super::staging::{StagedEntry, StagingBuffer};

/// Transaction state of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Nothing staged, no session
    Idle,

    /// A staged transaction is open under a session
    Staging,
}

/// One key-value object owned by the store
#[derive(Debug, Clone, Default)]
pub struct KvObject {
    /// Visible state; iterates in ascending key order
    committed: BTreeMap<String, String>,

    /// Pending mutations of the open transaction
    staging: StagingBuffer,

    /// Token of the open transaction; `Some` iff state is `Staging`
    session: Option<SessionId>,
}

impl KvObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object restored from persisted committed state
    pub fn with_committed(committed: BTreeMap<String, String>) -> Self {
        Self {
            committed,
            ..Self::default()
        }
    }

    pub fn state(&self) -> TxnState {
        if self.session.is_some() {
            TxnState::Staging
        } else {
            TxnState::Idle
        }
    }

    /// Apply a mutating call
    ///
    /// `Staged` records the mutations in the buffer, opening a transaction
    /// first when idle, and returns the session token. `Immediate` commits
    /// whatever is staged, applies the mutations to the committed set and
    /// returns `None`.
    pub fn apply(
        &mut self,
        mode: Mode,
        mutations: Vec<Mutation>,
        presented: Option<&SessionId>,
    ) -> Option<SessionId> {
        match mode {
            Mode::Staged => {
                let token = match &self.session {
                    Some(current) => {
                        if let Some(presented) = presented {
                            if presented != current {
                                tracing::debug!(
                                    "Staged call presented session {} while {} is open",
                                    presented,
                                    current
                                );
                            }
                        }
                        current.clone()
                    }
                    None => {
                        let token = SessionId::generate();
                        tracing::debug!("Opened session {}", token);
                        self.session = Some(token.clone());
                        token
                    }
                };

                for mutation in mutations {
                    self.staging.stage(mutation);
                }
                Some(token)
            }
            Mode::Immediate => {
                self.commit();
                for mutation in mutations {
                    match mutation {
                        Mutation::Upsert { key, value } => {
                            self.committed.insert(key, value);
                        }
                        Mutation::Delete { key } => {
                            self.committed.remove(&key);
                        }
                    }
                }
                None
            }
        }
    }

    /// Fold staged mutations into the committed set and close the session
    ///
    /// Returns the number of operations folded in.
    pub fn commit(&mut self) -> usize {
        let folded = self.staging.fold_into(&mut self.committed);
        if let Some(token) = self.session.take() {
            tracing::debug!("Committed session {} ({} ops)", token, folded);
        }
        folded
    }

    /// Discard staged mutations and close the session
    ///
    /// Returns the number of operations discarded.
    pub fn rollback(&mut self) -> usize {
        let discarded = self.staging.clear();
        if let Some(token) = self.session.take() {
            tracing::debug!("Rolled back session {} ({} ops)", token, discarded);
        }
        discarded
    }

    /// Committed value of `key`; staged state is never visible
    pub fn get(&self, key: &str) -> Option<&str> {
        self.committed.get(key).map(String::as_str)
    }

    /// Pending state of `key` in the open transaction
    pub fn staged(&self, key: &str) -> Option<StagedEntry> {
        self.staging.get(key)
    }

    pub fn committed(&self) -> &BTreeMap<String, String> {
        &self.committed
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}
