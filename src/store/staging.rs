//! Staging buffer
//!
//! Pending upserts and deletions of one object, not yet visible to reads.

use std::collections::{BTreeMap, HashMap};

use crate::protocol::Mutation;

/// Pending state of a single key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedEntry {
    /// Upsert waiting for commit
    Value(String),

    /// Deletion waiting for commit
    Tombstone,
}

/// Pending upserts and deletions of one object
///
/// A key is never both a pending upsert and a pending delete: staging one
/// kind removes the other, so the last staged call for a key decides its
/// fate on commit.
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    upserts: HashMap<String, String>,

    /// Deletion queue in call order; duplicates are harmless
    deletes: Vec<String>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation (last write wins per key)
    pub fn stage(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Upsert { key, value } => {
                self.deletes.retain(|pending| *pending != key);
                self.upserts.insert(key, value);
            }
            Mutation::Delete { key } => {
                self.upserts.remove(&key);
                self.deletes.push(key);
            }
        }
    }

    /// Pending state of `key`, if any
    pub fn get(&self, key: &str) -> Option<StagedEntry> {
        if let Some(value) = self.upserts.get(key) {
            return Some(StagedEntry::Value(value.clone()));
        }
        if self.deletes.iter().any(|pending| pending == key) {
            return Some(StagedEntry::Tombstone);
        }
        None
    }

    /// Apply upserts, then deletions, to `committed` and empty the buffer
    ///
    /// Returns the number of buffered operations folded in.
    pub fn fold_into(&mut self, committed: &mut BTreeMap<String, String>) -> usize {
        let folded = self.len();
        for (key, value) in self.upserts.drain() {
            committed.insert(key, value);
        }
        for key in self.deletes.drain(..) {
            committed.remove(&key);
        }
        folded
    }

    /// Drop everything; returns the number of operations discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.len();
        self.upserts.clear();
        self.deletes.clear();
        discarded
    }

    /// Number of buffered operations (deletions counted per call)
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn pending_upserts(&self) -> &HashMap<String, String> {
        &self.upserts
    }

    pub fn pending_deletes(&self) -> &[String] {
        &self.deletes
    }
}
