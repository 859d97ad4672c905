//! Tests for EdgexClient
//!
//! These tests verify:
//! - The full transactional contract over the loopback transport
//! - Wire shape of requests (comp, autocommit, finalize, cancel, session header)
//! - Session token propagation from responses
//! - Status and error-body mapping to EdgeError variants
//! - Local validation of batch payloads before anything is sent

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use edgekv::protocol::{decode_error, encode_error, ErrorCode, SESSION_ID_HEADER};
use edgekv::transport::{HttpRequest, HttpResponse, LoopbackTransport, Method, Transport};
use edgekv::{
    EdgeError, EdgexClient, KvClient, ListFormat, ListQuery, MemoryStore, ObjectOptions,
    ObjectType, Result,
};

// =============================================================================
// Test Transports
// =============================================================================

/// Loopback transport that records every request
struct Recording {
    inner: LoopbackTransport,
    requests: Mutex<Vec<HttpRequest>>,
}

impl Recording {
    fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner: LoopbackTransport::new(store),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for Recording {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.send(request)
    }
}

/// Transport answering every request with the same response
struct Canned(HttpResponse);

impl Transport for Canned {
    fn send(&self, _request: &HttpRequest) -> Result<HttpResponse> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_client() -> (Arc<Recording>, EdgexClient) {
    let recording = Recording::new(Arc::new(MemoryStore::in_memory()));
    let client = EdgexClient::with_transport(Arc::clone(&recording));
    client.bucket_create("bk1").unwrap();
    client
        .object_create("bk1", "o1", &ObjectOptions::default())
        .unwrap();
    (recording, client)
}

fn canned(status: u16, body: &str) -> EdgexClient {
    EdgexClient::with_transport(Canned(HttpResponse::new(status).with_body(body.to_string())))
}

// =============================================================================
// Contract Tests (loopback)
// =============================================================================

#[test]
fn test_end_to_end_staged_commit() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k1", "v1", true).unwrap();
    client.kv_post(&mut session, "k2", "v2", true).unwrap();
    assert!(matches!(
        client.kv_get("bk1", "o1", "k1"),
        Err(EdgeError::KeyNotFound { .. })
    ));

    client.kv_commit(&mut session).unwrap();
    assert_eq!(client.kv_get("bk1", "o1", "k1").unwrap(), "v1");

    let csv = client
        .kv_list("bk1", "o1", &ListQuery::new().max_count(10).format(ListFormat::Csv))
        .unwrap();
    assert_eq!(csv, "k1;v1\nk2;v2");
    let json = client.kv_list("bk1", "o1", &ListQuery::new().max_count(10)).unwrap();
    assert_eq!(json, r#"{"k1":"v1","k2":"v2"}"#);
}

#[test]
fn test_rollback_then_get_fails() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k1", "v1", true).unwrap();
    client.kv_rollback(&mut session).unwrap();

    assert!(session.token().is_none());
    assert!(matches!(
        client.kv_get("bk1", "o1", "k1"),
        Err(EdgeError::KeyNotFound { .. })
    ));
}

#[test]
fn test_immediate_write_autocommits_pending() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k4", "v4", true).unwrap();
    client.kv_post(&mut session, "k3", "v3", false).unwrap();

    assert!(session.token().is_none());
    assert_eq!(client.kv_get("bk1", "o1", "k4").unwrap(), "v4");
    assert_eq!(client.kv_get("bk1", "o1", "k3").unwrap(), "v3");
}

#[test]
fn test_upsert_then_delete_staged_leaves_key_absent() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k", "v1", true).unwrap();
    client.kv_delete(&mut session, "k", true).unwrap();
    client.kv_commit(&mut session).unwrap();
    client.kv_commit(&mut session).unwrap();

    assert!(client.kv_get("bk1", "o1", "k").is_err());
}

#[test]
fn test_repeated_commit_changes_nothing() {
    let store = Arc::new(MemoryStore::in_memory());
    let client = EdgexClient::loopback(Arc::clone(&store));
    client.bucket_create("bk1").unwrap();
    client.object_create("bk1", "o1", &ObjectOptions::default()).unwrap();

    let mut session = client.open_session("bk1", "o1").unwrap();
    client.kv_post(&mut session, "k", "v", true).unwrap();
    client.kv_commit(&mut session).unwrap();
    let listed = client.object_list("bk1", "", "", 0).unwrap();
    let snapshot = store.snapshot();

    thread::sleep(Duration::from_millis(5));
    client.kv_commit(&mut session).unwrap();

    assert_eq!(client.object_list("bk1", "", "", 0).unwrap(), listed);
    assert_eq!(store.snapshot(), snapshot);
}

#[test]
fn test_delete_nonexistent_key_succeeds() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    assert!(client.kv_delete(&mut session, "nope", false).is_ok());
}

#[test]
fn test_batches_over_the_wire() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client
        .kv_post_json(&mut session, r#"{"j":"1","n":{"deep":true}}"#, true)
        .unwrap();
    client.kv_post_csv(&mut session, "c1;x\nc2;y;z", true).unwrap();
    client.kv_delete_json(&mut session, r#"["c1"]"#, true).unwrap();
    client.kv_commit(&mut session).unwrap();

    assert_eq!(client.kv_get("bk1", "o1", "n").unwrap(), r#"{"deep":true}"#);
    assert_eq!(client.kv_get("bk1", "o1", "c2").unwrap(), "y;z");
    assert!(client.kv_get("bk1", "o1", "c1").is_err());
}

#[test]
fn test_keys_only_listing_over_the_wire() {
    let (_, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();
    client.kv_post_csv(&mut session, "b;2\na;1\nc;3", false).unwrap();

    let keys = client
        .kv_list("bk1", "o1", &ListQuery::new().include_values(false).from_key("b"))
        .unwrap();
    assert_eq!(keys, r#"["b","c"]"#);
}

#[test]
fn test_bucket_and_object_listings_over_the_wire() {
    let (_, client) = setup_client();
    client.bucket_create("bk0").unwrap();
    client.object_create("bk1", "o2", &ObjectOptions::default()).unwrap();
    client.object_create("bk1", "p1", &ObjectOptions::default()).unwrap();

    let names: Vec<String> = client.bucket_list().unwrap().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["bk0", "bk1"]);

    let objects: Vec<String> = client
        .object_list("bk1", "", "o", 0)
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(objects, vec!["o1", "o2"]);
}

#[test]
fn test_existence_checks() {
    let (_, client) = setup_client();

    assert!(client.bucket_exists("bk1").unwrap());
    assert!(!client.bucket_exists("nope").unwrap());
    assert!(client.object_exists("bk1", "o1").unwrap());
    assert!(!client.object_exists("bk1", "nope").unwrap());
}

#[test]
fn test_lifecycle_errors_mapped_from_codes() {
    let (_, client) = setup_client();

    assert!(matches!(client.bucket_create("bk1"), Err(EdgeError::BucketAlreadyExists(_))));
    assert!(matches!(
        client.object_create("bk1", "o1", &ObjectOptions::default()),
        Err(EdgeError::ObjectAlreadyExists(_))
    ));
    assert!(matches!(
        client.object_create("missing", "o1", &ObjectOptions::default()),
        Err(EdgeError::BucketNotFound(_))
    ));
    assert!(matches!(
        client.kv_get("bk1", "missing", "k"),
        Err(EdgeError::ObjectNotFound(_))
    ));
}

#[test]
fn test_deletes_are_idempotent() {
    let (_, client) = setup_client();

    client.object_delete("bk1", "o1").unwrap();
    client.object_delete("bk1", "o1").unwrap();
    client.bucket_delete("bk1").unwrap();
    client.bucket_delete("bk1").unwrap();
    assert!(!client.bucket_exists("bk1").unwrap());
}

// =============================================================================
// Wire Shape Tests
// =============================================================================

#[test]
fn test_staged_post_wire_shape() {
    let (recording, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k1", "v1", true).unwrap();
    let first = recording.last();
    assert_eq!(first.method, Method::Post);
    assert_eq!(first.path, "/bk1/o1");
    assert_eq!(first.query_param("comp"), Some("kv"));
    assert_eq!(first.query_param("key"), Some("k1"));
    assert_eq!(first.query_param("x-ccow-autocommit"), Some("0"));
    assert!(!first.has_query("finalize"));
    assert!(first.header_value(SESSION_ID_HEADER).is_none());
    assert_eq!(first.body_text(), "v1");

    let token = session.token().cloned().unwrap();
    client.kv_post(&mut session, "k2", "v2", true).unwrap();
    assert_eq!(
        recording.last().header_value(SESSION_ID_HEADER),
        Some(token.as_str())
    );
}

#[test]
fn test_immediate_post_wire_shape() {
    let (recording, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k", "v", false).unwrap();
    let request = recording.last();
    assert_eq!(request.query_param("x-ccow-autocommit"), Some("1"));
    assert!(request.has_query("finalize"));
}

#[test]
fn test_commit_and_rollback_wire_shape() {
    let (recording, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();

    client.kv_post(&mut session, "k", "v", true).unwrap();
    let token = session.token().cloned().unwrap();
    client.kv_commit(&mut session).unwrap();
    let commit = recording.last();
    assert_eq!(commit.method, Method::Post);
    assert_eq!(commit.query_param("x-ccow-autocommit"), Some("1"));
    assert!(commit.has_query("finalize"));
    assert_eq!(commit.body_text(), "{}");
    assert_eq!(commit.header_value(SESSION_ID_HEADER), Some(token.as_str()));

    client.kv_post(&mut session, "k", "v", true).unwrap();
    client.kv_rollback(&mut session).unwrap();
    let rollback = recording.last();
    assert_eq!(rollback.query_param("x-ccow-autocommit"), Some("0"));
    assert_eq!(rollback.query_param("cancel"), Some("1"));
}

#[test]
fn test_object_create_wire_shape() {
    let (recording, client) = setup_client();
    let options = ObjectOptions {
        object_type: ObjectType::KeyValue,
        chunk_size: 8192,
        btree_order: 8,
        ..ObjectOptions::default()
    };

    client.object_create("bk1", "o9", &options).unwrap();
    let request = recording.last();
    assert_eq!(request.query_param("comp"), Some("kv"));
    assert!(request.has_query("finalize"));
    assert_eq!(request.header_value("x-ccow-object-oflags"), Some("3"));
    assert_eq!(request.header_value("x-ccow-chunkmap-chunk-size"), Some("8192"));
    assert_eq!(request.header_value("x-ccow-chunkmap-btree-order"), Some("8"));
}

#[test]
fn test_list_wire_shape() {
    let (recording, client) = setup_client();
    let query = ListQuery::new()
        .from_key("a")
        .prefix("ab")
        .max_count(5)
        .format(ListFormat::Csv);

    client.kv_list("bk1", "o1", &query).unwrap();
    let request = recording.last();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.query_param("key"), Some("a"));
    assert_eq!(request.query_param("pattern"), Some("ab"));
    assert_eq!(request.query_param("maxresults"), Some("5"));
    assert_eq!(request.query_param("values"), Some("1"));
    assert_eq!(request.header_value("content-type"), Some("text/csv"));
}

#[test]
fn test_malformed_batches_never_sent() {
    let (recording, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();
    let sent = recording.count();

    let csv = client.kv_post_csv(&mut session, "no separator", true);
    let json = client.kv_post_json(&mut session, "[1]", true);
    let deletes = client.kv_delete_json(&mut session, "{", true);

    for result in [csv, json, deletes] {
        let error = result.unwrap_err();
        assert!(matches!(error, EdgeError::Encoding(_)));
        assert!(!error.is_ambiguous());
    }
    assert_eq!(recording.count(), sent);
}

#[test]
fn test_close_finalizes_stream_session() {
    let (recording, client) = setup_client();
    let mut session = client.open_session("bk1", "o1").unwrap();
    client.kv_post(&mut session, "k", "v", true).unwrap();

    client.close(session).unwrap();

    let request = recording.last();
    assert_eq!(request.method, Method::Head);
    assert_eq!(request.query_param("comp"), Some("streamsession"));
    assert_eq!(client.kv_get("bk1", "o1", "k").unwrap(), "v");
    assert!(client.open_session("bk1", "o1").is_ok());
}

// =============================================================================
// Status Mapping Tests
// =============================================================================

#[test]
fn test_bare_404_maps_by_target() {
    let client = canned(404, "");

    assert!(matches!(client.kv_get("b", "o", "k"), Err(EdgeError::KeyNotFound { .. })));
    assert!(matches!(
        client.kv_list("b", "o", &ListQuery::new()),
        Err(EdgeError::ObjectNotFound(_))
    ));
    assert!(matches!(client.bucket_list(), Err(EdgeError::BucketNotFound(_))));
    assert!(!client.bucket_exists("b").unwrap());
}

#[test]
fn test_bare_409_and_400() {
    let conflict = canned(409, "");
    assert!(matches!(conflict.bucket_create("b"), Err(EdgeError::BucketAlreadyExists(_))));
    assert!(matches!(
        conflict.object_create("b", "o", &ObjectOptions::default()),
        Err(EdgeError::ObjectAlreadyExists(_))
    ));

    let bad = canned(400, "nope");
    assert!(matches!(bad.bucket_create("b"), Err(EdgeError::InvalidArgument(msg)) if msg == "nope"));
}

#[test]
fn test_other_status_is_ambiguous_transport_error() {
    let client = canned(503, "busy");
    let mut session = client.open_session("b", "o").unwrap();

    let error = client.kv_post(&mut session, "k", "v", true).unwrap_err();
    assert!(matches!(error, EdgeError::Transport { status: 503, .. }));
    assert!(error.is_ambiguous());
    assert!(client.bucket_exists("b").is_err());
}

#[test]
fn test_error_code_overrides_status_fallback() {
    let body = encode_error(ErrorCode::NoSuchObject, "gone").unwrap();
    let client = canned(404, &body);

    assert!(matches!(client.kv_get("b", "o", "k"), Err(EdgeError::ObjectNotFound(path)) if path == "b/o"));
}

#[test]
fn test_store_error_message_not_wrapped_twice() {
    let request = HttpRequest::new(Method::Get, "/bk1/o1").query("comp", "kvget");
    let response = LoopbackTransport::new(Arc::new(MemoryStore::in_memory()))
        .send(&request)
        .unwrap();

    let body = decode_error(&response.text()).unwrap();
    assert_eq!(body.code, "InvalidArgument");
    assert_eq!(body.message, "Missing `key` parameter");

    let error = EdgexClient::with_transport(Canned(response))
        .kv_get("bk1", "o1", "k")
        .unwrap_err();
    assert_eq!(error.to_string(), "Invalid argument: Missing `key` parameter");
}

#[test]
fn test_failed_commit_keeps_token() {
    let store = Arc::new(MemoryStore::in_memory());
    let client = EdgexClient::loopback(Arc::clone(&store));
    client.bucket_create("bk1").unwrap();
    client.object_create("bk1", "o1", &ObjectOptions::default()).unwrap();

    let mut session = client.open_session("bk1", "o1").unwrap();
    client.kv_post(&mut session, "k", "v", true).unwrap();
    store.delete_object(session.path()).unwrap();

    assert!(matches!(client.kv_commit(&mut session), Err(EdgeError::ObjectNotFound(_))));
    assert!(session.in_transaction());
}
