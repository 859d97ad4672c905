//! In-process client
//!
//! Runs every `KvClient` operation directly against a shared `MemoryStore`.

use std::sync::Arc;

use crate::error::Result;
use crate::path::ObjectPath;
use crate::protocol::{
    decode_csv_upserts, decode_json_deletes, decode_json_upserts, map_deletes, map_upserts, KvMap,
    Mode, Mutation,
};
use crate::session::{Session, SessionManager};
use crate::store::MemoryStore;
use crate::types::{Bucket, ListQuery, ObjectEntry, ObjectOptions};

use super::KvClient;

/// Client calling a local store without any wire encoding
#[derive(Debug)]
pub struct MockClient {
    store: Arc<MemoryStore>,
    sessions: SessionManager,
}

impl MockClient {
    /// Client over a fresh in-memory store
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::in_memory()))
    }

    /// Client sharing `store` with other clients
    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            sessions: SessionManager::new(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn apply(&self, session: &mut Session, mutations: Vec<Mutation>, more: bool) -> Result<()> {
        let token = self.store.mutate(
            session.path(),
            Mode::from_more(more),
            mutations,
            session.token(),
        )?;
        session.update(token);
        Ok(())
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KvClient for MockClient {
    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn bucket_create(&self, bucket: &str) -> Result<()> {
        self.store.create_bucket(bucket)
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.store.bucket_exists(bucket)
    }

    fn bucket_delete(&self, bucket: &str) -> Result<()> {
        self.store.delete_bucket(bucket)
    }

    fn bucket_list(&self) -> Result<Vec<Bucket>> {
        Ok(self.store.list_buckets())
    }

    fn object_create(&self, bucket: &str, object: &str, _options: &ObjectOptions) -> Result<()> {
        self.store.create_object(&ObjectPath::new(bucket, object)?)
    }

    fn object_exists(&self, bucket: &str, object: &str) -> Result<bool> {
        Ok(self.store.object_exists(&ObjectPath::new(bucket, object)?))
    }

    fn object_delete(&self, bucket: &str, object: &str) -> Result<()> {
        self.store.delete_object(&ObjectPath::new(bucket, object)?)
    }

    fn object_list(
        &self,
        bucket: &str,
        from_key: &str,
        prefix: &str,
        max_count: usize,
    ) -> Result<Vec<ObjectEntry>> {
        self.store.list_objects(bucket, from_key, prefix, max_count)
    }

    fn kv_get(&self, bucket: &str, object: &str, key: &str) -> Result<String> {
        self.store.get(&ObjectPath::new(bucket, object)?, key)
    }

    fn kv_list(&self, bucket: &str, object: &str, query: &ListQuery) -> Result<String> {
        self.store.list(&ObjectPath::new(bucket, object)?, query)
    }

    fn kv_post(&self, session: &mut Session, key: &str, value: &str, more: bool) -> Result<()> {
        self.apply(session, vec![Mutation::upsert(key, value)], more)
    }

    fn kv_post_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()> {
        let mutations = map_upserts(map)?;
        self.apply(session, mutations, more)
    }

    fn kv_post_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()> {
        let mutations = decode_json_upserts(json)?;
        self.apply(session, mutations, more)
    }

    fn kv_post_csv(&self, session: &mut Session, csv: &str, more: bool) -> Result<()> {
        let mutations = decode_csv_upserts(csv)?;
        self.apply(session, mutations, more)
    }

    fn kv_delete(&self, session: &mut Session, key: &str, more: bool) -> Result<()> {
        self.apply(session, vec![Mutation::delete(key)], more)
    }

    fn kv_delete_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()> {
        self.apply(session, map_deletes(map), more)
    }

    fn kv_delete_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()> {
        let mutations = decode_json_deletes(json)?;
        self.apply(session, mutations, more)
    }

    fn kv_commit(&self, session: &mut Session) -> Result<()> {
        self.store.commit(session.path())?;
        session.clear();
        Ok(())
    }

    fn kv_rollback(&self, session: &mut Session) -> Result<()> {
        self.store.rollback(session.path())?;
        session.clear();
        Ok(())
    }
}
