//! Memory Store
//!
//! The reference store: buckets, key-value objects, transactions and
//! listings behind one lock, with optional snapshot persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use chrono::{SecondsFormat, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::{SnapshotStrategy, StoreConfig};
use crate::error::{EdgeError, Result};
use crate::path::{bucket_name, ObjectPath};
use crate::protocol::{Mode, Mutation};
use crate::query;
use crate::session::SessionId;
use crate::types::{Bucket, ListQuery, ObjectEntry};

use super::object::KvObject;
use super::snapshot::{ObjectRecord, Snapshot};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// An object plus its listing metadata
#[derive(Debug, Clone)]
struct StoredObject {
    object: KvObject,
    last_modified: String,
}

impl StoredObject {
    fn new(object: KvObject) -> Self {
        Self {
            object,
            last_modified: now_rfc3339(),
        }
    }

    fn touch(&mut self) {
        self.last_modified = now_rfc3339();
    }

    /// Committed bytes (keys plus values)
    fn size(&self) -> u64 {
        self.object
            .committed()
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: BTreeMap<String, Bucket>,
    objects: BTreeMap<ObjectPath, StoredObject>,
}

impl StoreState {
    fn restore(snapshot: Snapshot) -> Self {
        let buckets = snapshot
            .buckets
            .into_iter()
            .map(|bucket| (bucket.name.clone(), bucket))
            .collect();
        let objects = snapshot
            .objects
            .into_iter()
            .map(|record| {
                let stored = StoredObject {
                    object: KvObject::with_committed(record.key_values),
                    last_modified: record.last_modified,
                };
                (record.path, stored)
            })
            .collect();
        Self { buckets, objects }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            buckets: self.buckets.values().cloned().collect(),
            objects: self
                .objects
                .iter()
                .map(|(path, stored)| ObjectRecord {
                    path: path.clone(),
                    last_modified: stored.last_modified.clone(),
                    key_values: stored.object.committed().clone(),
                })
                .collect(),
        }
    }

    fn object(&self, path: &ObjectPath) -> Result<&StoredObject> {
        self.objects
            .get(path)
            .ok_or_else(|| EdgeError::ObjectNotFound(path.to_string()))
    }

    fn object_mut(&mut self, path: &ObjectPath) -> Result<&mut StoredObject> {
        self.objects
            .get_mut(path)
            .ok_or_else(|| EdgeError::ObjectNotFound(path.to_string()))
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Writer thread for `SnapshotStrategy::Background`
struct SnapshotWriter {
    sender: Mutex<Option<Sender<Snapshot>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotWriter {
    fn spawn(path: PathBuf) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("edgekv-snapshot".to_string())
            .spawn(move || Self::run(&path, receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Write snapshots as they arrive, skipping any superseded by a newer one
    fn run(path: &Path, receiver: Receiver<Snapshot>) {
        while let Ok(mut snapshot) = receiver.recv() {
            let mut skipped = 0usize;
            while let Ok(newer) = receiver.try_recv() {
                snapshot = newer;
                skipped += 1;
            }
            if skipped > 0 {
                tracing::trace!("Coalesced {} pending snapshots", skipped);
            }
            if let Err(e) = snapshot.write_to(path) {
                tracing::warn!("Background snapshot to {} failed: {}", path.display(), e);
            }
        }
        tracing::debug!("Snapshot writer for {} stopped", path.display());
    }

    fn submit(&self, snapshot: Snapshot) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(snapshot).is_err() {
                    tracing::warn!("Snapshot writer is gone; change not persisted");
                }
            }
            None => tracing::warn!("Snapshot writer already closed; change not persisted"),
        }
    }

    /// Drain pending snapshots and stop the thread
    fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Snapshot writer thread panicked");
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Persistence {
    /// Purely in memory
    Disabled,

    /// Snapshot written inside the lock after every change
    EveryWrite(PathBuf),

    Background(SnapshotWriter),
}

// =============================================================================
// Store
// =============================================================================

/// In-memory reference store
///
/// ## Concurrency Model
///
/// A single `parking_lot::Mutex` guards buckets and objects. Each
/// operation locks once, so a staged call and a commit on the same object
/// never interleave. Under `EveryWrite` the snapshot write happens while the
/// lock is held; under `Background` only the snapshot copy does.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    persistence: Persistence,
}

impl MemoryStore {
    /// Open a store, restoring committed state from the snapshot file if any
    ///
    /// A missing snapshot yields an empty store. An unreadable or corrupt
    /// one is logged and also yields an empty store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let (state, persistence) = match config.snapshot_path {
            None => (StoreState::default(), Persistence::Disabled),
            Some(path) => {
                let state = Self::load_state(&path);
                let persistence = match config.snapshot_strategy {
                    SnapshotStrategy::EveryWrite => Persistence::EveryWrite(path),
                    SnapshotStrategy::Background => {
                        Persistence::Background(SnapshotWriter::spawn(path)?)
                    }
                };
                (state, persistence)
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            persistence,
        })
    }

    /// Store without a backing file
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            persistence: Persistence::Disabled,
        }
    }

    fn load_state(path: &Path) -> StoreState {
        match Snapshot::load(path) {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    "Restored {} buckets and {} objects from {}",
                    snapshot.buckets.len(),
                    snapshot.objects.len(),
                    path.display()
                );
                StoreState::restore(snapshot)
            }
            Ok(None) => StoreState::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                StoreState::default()
            }
        }
    }

    /// Persist committed state; failures are logged, never returned
    fn persist(&self, state: &StoreState) {
        match &self.persistence {
            Persistence::Disabled => {}
            Persistence::EveryWrite(path) => {
                if let Err(e) = state.snapshot().write_to(path) {
                    tracing::warn!("Snapshot to {} failed: {}", path.display(), e);
                }
            }
            Persistence::Background(writer) => writer.submit(state.snapshot()),
        }
    }

    /// Flush pending background snapshots and stop the writer thread
    ///
    /// The store stays usable in memory; later changes are not persisted
    /// under `Background`.
    pub fn close(&self) {
        if let Persistence::Background(writer) = &self.persistence {
            writer.shutdown();
        }
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    pub fn create_bucket(&self, name: &str) -> Result<()> {
        let name = bucket_name(name)?;
        let mut state = self.state.lock();
        if state.buckets.contains_key(&name) {
            return Err(EdgeError::BucketAlreadyExists(name));
        }

        tracing::debug!("Created bucket {}", name);
        state.buckets.insert(
            name.clone(),
            Bucket {
                name,
                creation_date: now_rfc3339(),
            },
        );
        self.persist(&state);
        Ok(())
    }

    /// Remove a bucket and every object in it; absent buckets are a no-op
    pub fn delete_bucket(&self, name: &str) -> Result<()> {
        let name = bucket_name(name)?;
        let mut state = self.state.lock();
        if state.buckets.remove(&name).is_none() {
            return Ok(());
        }

        let before = state.objects.len();
        state.objects.retain(|path, _| path.bucket() != name);
        tracing::debug!(
            "Deleted bucket {} with {} objects",
            name,
            before - state.objects.len()
        );
        self.persist(&state);
        Ok(())
    }

    pub fn bucket_exists(&self, name: &str) -> Result<bool> {
        let name = bucket_name(name)?;
        Ok(self.state.lock().buckets.contains_key(&name))
    }

    /// All buckets, ascending by name
    pub fn list_buckets(&self) -> Vec<Bucket> {
        self.state.lock().buckets.values().cloned().collect()
    }

    // =========================================================================
    // Objects
    // =========================================================================

    pub fn create_object(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock();
        if !state.buckets.contains_key(path.bucket()) {
            return Err(EdgeError::BucketNotFound(path.bucket().to_string()));
        }
        if state.objects.contains_key(path) {
            return Err(EdgeError::ObjectAlreadyExists(path.to_string()));
        }

        tracing::debug!("Created object {}", path);
        state.objects.insert(path.clone(), StoredObject::new(KvObject::new()));
        self.persist(&state);
        Ok(())
    }

    /// Remove an object with its staging buffer; absent objects are a no-op
    pub fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock();
        if state.objects.remove(path).is_some() {
            tracing::debug!("Deleted object {}", path);
            self.persist(&state);
        }
        Ok(())
    }

    pub fn object_exists(&self, path: &ObjectPath) -> bool {
        self.state.lock().objects.contains_key(path)
    }

    /// Objects of `bucket` in ascending name order, windowed like key listings
    pub fn list_objects(
        &self,
        bucket: &str,
        from_key: &str,
        prefix: &str,
        max_count: usize,
    ) -> Result<Vec<ObjectEntry>> {
        let bucket = bucket_name(bucket)?;
        let state = self.state.lock();
        if !state.buckets.contains_key(&bucket) {
            return Err(EdgeError::BucketNotFound(bucket));
        }

        let in_bucket = state
            .objects
            .iter()
            .filter(|(path, _)| path.bucket() == bucket)
            .map(|(path, stored)| (path.object(), stored));

        Ok(query::window(in_bucket, from_key, prefix, max_count)
            .into_iter()
            .map(|(name, stored)| ObjectEntry {
                key: name.to_string(),
                last_modified: stored.last_modified.clone(),
                size: stored.size(),
            })
            .collect())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Apply a mutating call; returns the open session token when staged
    pub fn mutate(
        &self,
        path: &ObjectPath,
        mode: Mode,
        mutations: Vec<Mutation>,
        session: Option<&SessionId>,
    ) -> Result<Option<SessionId>> {
        let mut state = self.state.lock();
        let stored = state.object_mut(path)?;
        // An immediate call with nothing staged and nothing to apply is a no-op
        let changes = stored.object.staging().len() + mutations.len();
        let token = stored.object.apply(mode, mutations, session);

        if mode == Mode::Immediate && changes > 0 {
            stored.touch();
            self.persist(&state);
        }
        Ok(token)
    }

    /// Fold the staging buffer into the committed set
    pub fn commit(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock();
        let stored = state.object_mut(path)?;
        if stored.object.commit() > 0 {
            stored.touch();
            self.persist(&state);
        }
        Ok(())
    }

    /// Discard the staging buffer
    pub fn rollback(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock();
        state.object_mut(path)?.object.rollback();
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Committed value of `key`
    pub fn get(&self, path: &ObjectPath, key: &str) -> Result<String> {
        let state = self.state.lock();
        state
            .object(path)?
            .object
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| EdgeError::KeyNotFound {
                object: path.to_string(),
                key: key.to_string(),
            })
    }

    /// Rendered listing of the committed set
    pub fn list(&self, path: &ObjectPath, query: &ListQuery) -> Result<String> {
        let state = self.state.lock();
        Ok(query::list(state.object(path)?.object.committed(), query))
    }

    /// Copy of an object's full state, staging included
    pub fn object(&self, path: &ObjectPath) -> Result<KvObject> {
        Ok(self.state.lock().object(path)?.object.clone())
    }

    /// Copy of the committed state of the whole store
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("buckets", &state.buckets.len())
            .field("objects", &state.objects.len())
            .finish()
    }
}
