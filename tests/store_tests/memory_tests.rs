//! Tests for MemoryStore
//!
//! These tests verify:
//! - Bucket and object lifecycle, including idempotent deletes
//! - Transactions through the store (mutate / commit / rollback)
//! - Read-committed gets and listings
//! - Object listings scoped to one bucket
//! - Concurrent staging on one object

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use edgekv::protocol::{Mode, Mutation};
use edgekv::store::{MemoryStore, TxnState};
use edgekv::{EdgeError, ListFormat, ListQuery, ObjectPath};

// =============================================================================
// Helper Functions
// =============================================================================

fn path(bucket: &str, object: &str) -> ObjectPath {
    ObjectPath::new(bucket, object).unwrap()
}

fn setup_store_with_object() -> (MemoryStore, ObjectPath) {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk1").unwrap();
    let p = path("bk1", "o1");
    store.create_object(&p).unwrap();
    (store, p)
}

fn put_now(store: &MemoryStore, p: &ObjectPath, key: &str, value: &str) {
    store
        .mutate(p, Mode::Immediate, vec![Mutation::upsert(key, value)], None)
        .unwrap();
}

// =============================================================================
// Bucket Tests
// =============================================================================

#[test]
fn test_create_bucket() {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk1").unwrap();

    assert!(store.bucket_exists("bk1").unwrap());
    assert!(!store.bucket_exists("bk2").unwrap());
}

#[test]
fn test_create_bucket_twice_fails() {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk1").unwrap();

    let result = store.create_bucket("bk1");
    assert!(matches!(result, Err(EdgeError::BucketAlreadyExists(name)) if name == "bk1"));
}

#[test]
fn test_create_bucket_empty_name_fails() {
    let store = MemoryStore::in_memory();

    assert!(matches!(store.create_bucket("   "), Err(EdgeError::InvalidArgument(_))));
}

#[test]
fn test_bucket_creation_date_is_rfc3339() {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk1").unwrap();

    let buckets = store.list_buckets();
    assert_eq!(buckets.len(), 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&buckets[0].creation_date).is_ok());
}

#[test]
fn test_list_buckets_sorted() {
    let store = MemoryStore::in_memory();
    for name in ["zeta", "alpha", "mid"] {
        store.create_bucket(name).unwrap();
    }

    let names: Vec<String> = store.list_buckets().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_delete_absent_bucket_is_noop() {
    let store = MemoryStore::in_memory();

    assert!(store.delete_bucket("nope").is_ok());
}

#[test]
fn test_delete_bucket_removes_its_objects() {
    let (store, p) = setup_store_with_object();
    store.create_bucket("other").unwrap();
    let other = path("other", "o1");
    store.create_object(&other).unwrap();

    store.delete_bucket("bk1").unwrap();

    assert!(!store.object_exists(&p));
    assert!(store.object_exists(&other));
}

// =============================================================================
// Object Tests
// =============================================================================

#[test]
fn test_create_object_requires_bucket() {
    let store = MemoryStore::in_memory();

    let result = store.create_object(&path("missing", "o1"));
    assert!(matches!(result, Err(EdgeError::BucketNotFound(name)) if name == "missing"));
}

#[test]
fn test_create_object_twice_fails() {
    let (store, p) = setup_store_with_object();

    assert!(matches!(store.create_object(&p), Err(EdgeError::ObjectAlreadyExists(_))));
}

#[test]
fn test_new_object_is_empty_and_idle() {
    let (store, p) = setup_store_with_object();
    let object = store.object(&p).unwrap();

    assert!(object.is_empty());
    assert_eq!(object.state(), TxnState::Idle);
}

#[test]
fn test_delete_object_is_idempotent() {
    let (store, p) = setup_store_with_object();

    store.delete_object(&p).unwrap();
    store.delete_object(&p).unwrap();
    assert!(!store.object_exists(&p));
}

#[test]
fn test_list_objects_scoped_to_bucket() {
    let store = MemoryStore::in_memory();
    store.create_bucket("a").unwrap();
    store.create_bucket("ab").unwrap();
    store.create_object(&path("a", "x1")).unwrap();
    store.create_object(&path("a", "x2")).unwrap();
    store.create_object(&path("ab", "x3")).unwrap();

    let keys: Vec<String> = store
        .list_objects("a", "", "", 0)
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["x1", "x2"]);
}

#[test]
fn test_list_objects_window() {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk").unwrap();
    for name in ["img-3", "doc-1", "img-1", "img-2", "doc-2"] {
        store.create_object(&path("bk", name)).unwrap();
    }

    let keys: Vec<String> = store
        .list_objects("bk", "img-2", "img-", 0)
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["img-2", "img-3"]);

    let limited = store.list_objects("bk", "", "", 2).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].key, "doc-1");
}

#[test]
fn test_list_objects_missing_bucket_fails() {
    let store = MemoryStore::in_memory();

    assert!(matches!(
        store.list_objects("missing", "", "", 0),
        Err(EdgeError::BucketNotFound(_))
    ));
}

#[test]
fn test_object_size_counts_committed_bytes() {
    let (store, p) = setup_store_with_object();
    put_now(&store, &p, "ab", "cde");

    let entries = store.list_objects("bk1", "", "", 0).unwrap();
    assert_eq!(entries[0].size, 5);
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_mutate_unknown_object_fails() {
    let store = MemoryStore::in_memory();
    store.create_bucket("bk1").unwrap();

    let result = store.mutate(&path("bk1", "nope"), Mode::Staged, vec![], None);
    assert!(matches!(result, Err(EdgeError::ObjectNotFound(_))));
}

#[test]
fn test_commit_and_rollback_unknown_object_fail() {
    let store = MemoryStore::in_memory();
    let p = path("bk1", "nope");

    assert!(matches!(store.commit(&p), Err(EdgeError::ObjectNotFound(_))));
    assert!(matches!(store.rollback(&p), Err(EdgeError::ObjectNotFound(_))));
}

#[test]
fn test_staged_then_commit_visible() {
    let (store, p) = setup_store_with_object();
    let token = store
        .mutate(&p, Mode::Staged, vec![Mutation::upsert("k1", "v1")], None)
        .unwrap();
    assert!(token.is_some());

    assert!(matches!(store.get(&p, "k1"), Err(EdgeError::KeyNotFound { .. })));
    store.commit(&p).unwrap();
    assert_eq!(store.get(&p, "k1").unwrap(), "v1");
}

#[test]
fn test_staged_token_is_stable_within_transaction() {
    let (store, p) = setup_store_with_object();
    let first = store
        .mutate(&p, Mode::Staged, vec![Mutation::upsert("a", "1")], None)
        .unwrap();
    let second = store
        .mutate(&p, Mode::Staged, vec![Mutation::upsert("b", "2")], first.as_ref())
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_rollback_discards_staged() {
    let (store, p) = setup_store_with_object();
    store
        .mutate(&p, Mode::Staged, vec![Mutation::upsert("k1", "v1")], None)
        .unwrap();
    store.rollback(&p).unwrap();

    assert!(matches!(store.get(&p, "k1"), Err(EdgeError::KeyNotFound { .. })));
    assert!(store.object(&p).unwrap().session().is_none());
}

#[test]
fn test_empty_immediate_call_changes_nothing() {
    let (store, p) = setup_store_with_object();
    put_now(&store, &p, "k", "v");
    let before = store.snapshot();

    thread::sleep(Duration::from_millis(5));
    store.mutate(&p, Mode::Immediate, Vec::new(), None).unwrap();

    assert_eq!(store.snapshot(), before);
}

#[test]
fn test_get_unknown_object_fails() {
    let store = MemoryStore::in_memory();

    assert!(matches!(
        store.get(&path("bk1", "o1"), "k"),
        Err(EdgeError::ObjectNotFound(_))
    ));
}

#[test]
fn test_list_reads_committed_only() {
    let (store, p) = setup_store_with_object();
    put_now(&store, &p, "a", "1");
    store
        .mutate(&p, Mode::Staged, vec![Mutation::upsert("b", "2")], None)
        .unwrap();

    let json = store.list(&p, &ListQuery::new()).unwrap();
    assert_eq!(json, r#"{"a":"1"}"#);

    let csv = store
        .list(&p, &ListQuery::new().format(ListFormat::Csv))
        .unwrap();
    assert_eq!(csv, "a;1");
}

#[test]
fn test_delete_bucket_then_object_gone() {
    let (store, p) = setup_store_with_object();
    put_now(&store, &p, "a", "1");
    store.delete_bucket("bk1").unwrap();

    assert!(matches!(store.get(&p, "a"), Err(EdgeError::ObjectNotFound(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_staged_posts_lose_nothing() {
    let (store, p) = setup_store_with_object();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            let p = p.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    store
                        .mutate(
                            &p,
                            Mode::Staged,
                            vec![Mutation::upsert(format!("t{}_{}", t, i), "v")],
                            None,
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.object(&p).unwrap().staging().len(), 400);
    store.commit(&p).unwrap();
    assert_eq!(store.object(&p).unwrap().len(), 400);
}

#[test]
fn test_concurrent_objects_in_one_store() {
    let store = Arc::new(MemoryStore::in_memory());
    store.create_bucket("bk").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let p = path("bk", &format!("obj{}", t));
                store.create_object(&p).unwrap();
                for i in 0..25 {
                    store
                        .mutate(&p, Mode::Immediate, vec![Mutation::upsert(format!("k{}", i), "v")], None)
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        assert_eq!(store.object(&path("bk", &format!("obj{}", t))).unwrap().len(), 25);
    }
}
