//! S3X protocol client
//!
//! Builds S3X requests for every `KvClient` operation and maps responses
//! back to values, session tokens and errors.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{EdgeError, Result};
use crate::path::{bucket_name, ObjectPath};
use crate::protocol::{
    decode_bucket_list, decode_csv_upserts, decode_error, decode_json_deletes,
    decode_json_upserts, decode_object_list, encode_map, ErrorCode, KvMap, Mode,
    AUTOCOMMIT_PARAM, BTREE_ORDER_HEADER, CANCEL_PARAM, CHUNK_SIZE_HEADER, COMP_DELETE, COMP_KV,
    COMP_KV_GET, COMP_STREAM_SESSION, CONTENT_TYPE_CSV, CONTENT_TYPE_JSON, CONTENT_TYPE_OCTET,
    FINALIZE_PARAM, OBJECT_OFLAGS_HEADER, SESSION_ID_HEADER,
};
use crate::session::{Session, SessionId, SessionManager};
use crate::store::MemoryStore;
use crate::transport::{HttpRequest, HttpResponse, LoopbackTransport, Method, ReqwestTransport, Transport};
use crate::types::{
    Bucket, ListQuery, ObjectEntry, ObjectOptions, ObjectType, CCOW_O_CREATE, CCOW_O_REPLACE,
};

use super::KvClient;

/// What a request addressed, for mapping bare status codes to errors
enum Target<'a> {
    Bucket(&'a str),
    Object(&'a ObjectPath),
    Key(&'a ObjectPath, &'a str),
}

impl Target<'_> {
    fn not_found(&self) -> EdgeError {
        match self {
            Target::Bucket(bucket) => EdgeError::BucketNotFound(bucket.to_string()),
            Target::Object(path) => EdgeError::ObjectNotFound(path.to_string()),
            Target::Key(path, key) => EdgeError::KeyNotFound {
                object: path.to_string(),
                key: key.to_string(),
            },
        }
    }

    fn already_exists(&self) -> EdgeError {
        match self {
            Target::Bucket(bucket) => EdgeError::BucketAlreadyExists(bucket.to_string()),
            Target::Object(path) | Target::Key(path, _) => {
                EdgeError::ObjectAlreadyExists(path.to_string())
            }
        }
    }

    fn bucket(&self) -> String {
        match self {
            Target::Bucket(bucket) => bucket.to_string(),
            Target::Object(path) | Target::Key(path, _) => path.bucket().to_string(),
        }
    }

    fn object(&self) -> String {
        match self {
            Target::Bucket(bucket) => bucket.to_string(),
            Target::Object(path) | Target::Key(path, _) => path.to_string(),
        }
    }
}

/// Map a non-2xx response to an error
///
/// An `<Error>` body code wins; otherwise the status decides, with the
/// addressed entity picking the not-found / already-exists variant.
fn status_error(response: &HttpResponse, target: &Target<'_>) -> EdgeError {
    let text = response.text();

    if let Some(body) = decode_error(&text) {
        if let Some(code) = ErrorCode::parse(&body.code) {
            return match code {
                ErrorCode::NoSuchBucket => EdgeError::BucketNotFound(target.bucket()),
                ErrorCode::NoSuchObject => EdgeError::ObjectNotFound(target.object()),
                ErrorCode::NoSuchKey => target.not_found(),
                ErrorCode::BucketAlreadyExists => EdgeError::BucketAlreadyExists(target.bucket()),
                ErrorCode::ObjectAlreadyExists => EdgeError::ObjectAlreadyExists(target.object()),
                ErrorCode::InvalidArgument => EdgeError::InvalidArgument(body.message),
                ErrorCode::MalformedPayload => EdgeError::Encoding(body.message),
                ErrorCode::InternalError => EdgeError::Transport {
                    status: response.status,
                    message: body.message,
                },
            };
        }
    }

    match response.status {
        404 => target.not_found(),
        409 => target.already_exists(),
        400 => EdgeError::InvalidArgument(text),
        status => EdgeError::Transport {
            status,
            message: text,
        },
    }
}

/// Client speaking the S3X protocol over a [`Transport`]
pub struct EdgexClient {
    transport: Box<dyn Transport>,
    sessions: SessionManager,
    object_options: ObjectOptions,
}

impl EdgexClient {
    /// Client for a remote endpoint over HTTP
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        let mut client = Self::with_transport(transport);
        client.object_options = config.object_options;
        Ok(client)
    }

    /// Client over any transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            sessions: SessionManager::new(),
            object_options: ObjectOptions::default(),
        }
    }

    /// Client over the loopback transport to a local store
    pub fn loopback(store: Arc<MemoryStore>) -> Self {
        Self::with_transport(LoopbackTransport::new(store))
    }

    /// Options configured for object creation
    pub fn object_options(&self) -> &ObjectOptions {
        &self.object_options
    }

    fn send(&self, request: HttpRequest, target: &Target<'_>) -> Result<HttpResponse> {
        tracing::debug!("{} {}", request.method, request.path);
        let response = self.transport.send(&request)?;
        tracing::debug!("{} {} -> {}", request.method, request.path, response.status);

        if response.is_success() {
            Ok(response)
        } else {
            Err(status_error(&response, target))
        }
    }

    /// HEAD probe: 2xx is true, 404 is false, anything else an error
    fn exists(&self, request: HttpRequest, target: &Target<'_>) -> Result<bool> {
        match self.send(request, target) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Send a mutating key-value request and take the token from the reply
    fn mutate(&self, session: &mut Session, request: HttpRequest, more: bool) -> Result<()> {
        let mode = Mode::from_more(more);
        let mut request = request.query(AUTOCOMMIT_PARAM, mode.autocommit_flag());
        if mode == Mode::Immediate {
            request = request.flag(FINALIZE_PARAM);
        }
        if let Some(token) = session.token() {
            request = request.header(SESSION_ID_HEADER, token.as_str());
        }

        let path = session.path().clone();
        let response = self.send(request, &Target::Object(&path))?;
        let token = match mode {
            Mode::Staged => response
                .header(SESSION_ID_HEADER)
                .and_then(SessionId::from_wire),
            Mode::Immediate => None,
        };
        session.update(token);
        Ok(())
    }

    fn kv_request(method: Method, session: &Session) -> HttpRequest {
        HttpRequest::new(method, session.path().url_path()).query("comp", COMP_KV)
    }

    /// Commit or rollback request carrying the session token
    fn control(&self, session: &mut Session, request: HttpRequest) -> Result<()> {
        let mut request = request
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body("{}");
        if let Some(token) = session.token() {
            request = request.header(SESSION_ID_HEADER, token.as_str());
        }

        let path = session.path().clone();
        self.send(request, &Target::Object(&path))?;
        session.clear();
        Ok(())
    }
}

impl KvClient for EdgexClient {
    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    fn bucket_create(&self, bucket: &str) -> Result<()> {
        let bucket = bucket_name(bucket)?;
        self.send(
            HttpRequest::new(Method::Put, format!("/{}", bucket)),
            &Target::Bucket(&bucket),
        )?;
        Ok(())
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let bucket = bucket_name(bucket)?;
        let request = HttpRequest::new(Method::Head, format!("/{}", bucket))
            .query("comp", COMP_STREAM_SESSION)
            .flag(FINALIZE_PARAM);
        self.exists(request, &Target::Bucket(&bucket))
    }

    fn bucket_delete(&self, bucket: &str) -> Result<()> {
        let bucket = bucket_name(bucket)?;
        match self.send(
            HttpRequest::new(Method::Delete, format!("/{}", bucket)),
            &Target::Bucket(&bucket),
        ) {
            Ok(_) => Ok(()),
            Err(EdgeError::BucketNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn bucket_list(&self) -> Result<Vec<Bucket>> {
        let response = self.send(HttpRequest::new(Method::Get, "/"), &Target::Bucket(""))?;
        decode_bucket_list(&response.text())
    }

    // =========================================================================
    // Objects
    // =========================================================================

    fn object_create(&self, bucket: &str, object: &str, options: &ObjectOptions) -> Result<()> {
        let path = ObjectPath::new(bucket, object)?;
        let comp = match options.object_type {
            ObjectType::KeyValue => COMP_KV,
            ObjectType::Object => COMP_STREAM_SESSION,
        };
        let request = HttpRequest::new(Method::Post, path.url_path())
            .query("comp", comp)
            .flag(FINALIZE_PARAM)
            .header("Content-Type", options.content_type.as_str())
            .header(OBJECT_OFLAGS_HEADER, (CCOW_O_CREATE | CCOW_O_REPLACE).to_string())
            .header(BTREE_ORDER_HEADER, options.btree_order.to_string())
            .header(CHUNK_SIZE_HEADER, options.chunk_size.to_string());

        self.send(request, &Target::Object(&path))?;
        Ok(())
    }

    fn object_exists(&self, bucket: &str, object: &str) -> Result<bool> {
        let path = ObjectPath::new(bucket, object)?;
        let request = HttpRequest::new(Method::Head, path.url_path())
            .query("comp", COMP_STREAM_SESSION)
            .flag(FINALIZE_PARAM);
        self.exists(request, &Target::Object(&path))
    }

    fn object_delete(&self, bucket: &str, object: &str) -> Result<()> {
        let path = ObjectPath::new(bucket, object)?;
        let request =
            HttpRequest::new(Method::Delete, path.url_path()).query("comp", COMP_DELETE);
        match self.send(request, &Target::Object(&path)) {
            Ok(_) => Ok(()),
            Err(EdgeError::ObjectNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn object_list(
        &self,
        bucket: &str,
        from_key: &str,
        prefix: &str,
        max_count: usize,
    ) -> Result<Vec<ObjectEntry>> {
        let bucket = bucket_name(bucket)?;
        let mut request = HttpRequest::new(Method::Get, format!("/{}", bucket));
        if !from_key.is_empty() {
            request = request.query("marker", from_key);
        }
        if !prefix.is_empty() {
            request = request.query("prefix", prefix);
        }
        if max_count > 0 {
            request = request.query("max-keys", max_count.to_string());
        }

        let response = self.send(request, &Target::Bucket(&bucket))?;
        decode_object_list(&response.text())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn kv_get(&self, bucket: &str, object: &str, key: &str) -> Result<String> {
        let path = ObjectPath::new(bucket, object)?;
        let request = HttpRequest::new(Method::Get, path.url_path())
            .query("comp", COMP_KV_GET)
            .query("key", key);
        let response = self.send(request, &Target::Key(&path, key))?;
        Ok(response.text())
    }

    fn kv_list(&self, bucket: &str, object: &str, query: &ListQuery) -> Result<String> {
        let path = ObjectPath::new(bucket, object)?;
        let mut request = HttpRequest::new(Method::Get, path.url_path()).query("comp", COMP_KV);
        if !query.from_key.is_empty() {
            request = request.query("key", query.from_key.as_str());
        }
        if !query.prefix.is_empty() {
            request = request.query("pattern", query.prefix.as_str());
        }
        if query.max_count > 0 {
            request = request.query("maxresults", query.max_count.to_string());
        }
        if query.include_values {
            request = request.query("values", "1");
        }
        let request = request.header("Content-Type", query.format.content_type());

        let response = self.send(request, &Target::Object(&path))?;
        Ok(response.text())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn kv_post(&self, session: &mut Session, key: &str, value: &str, more: bool) -> Result<()> {
        let request = Self::kv_request(Method::Post, session)
            .query("key", key)
            .header("Content-Type", CONTENT_TYPE_OCTET)
            .body(value.to_string());
        self.mutate(session, request, more)
    }

    fn kv_post_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()> {
        let request = Self::kv_request(Method::Post, session)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(encode_map(map)?);
        self.mutate(session, request, more)
    }

    fn kv_post_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()> {
        decode_json_upserts(json)?;
        let request = Self::kv_request(Method::Post, session)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(json.to_string());
        self.mutate(session, request, more)
    }

    fn kv_post_csv(&self, session: &mut Session, csv: &str, more: bool) -> Result<()> {
        decode_csv_upserts(csv)?;
        let request = Self::kv_request(Method::Post, session)
            .header("Content-Type", CONTENT_TYPE_CSV)
            .body(csv.to_string());
        self.mutate(session, request, more)
    }

    fn kv_delete(&self, session: &mut Session, key: &str, more: bool) -> Result<()> {
        let request = Self::kv_request(Method::Delete, session).query("key", key);
        self.mutate(session, request, more)
    }

    fn kv_delete_map(&self, session: &mut Session, map: &KvMap, more: bool) -> Result<()> {
        let request = Self::kv_request(Method::Delete, session)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(encode_map(map)?);
        self.mutate(session, request, more)
    }

    fn kv_delete_json(&self, session: &mut Session, json: &str, more: bool) -> Result<()> {
        decode_json_deletes(json)?;
        let request = Self::kv_request(Method::Delete, session)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(json.to_string());
        self.mutate(session, request, more)
    }

    // =========================================================================
    // Transaction Control
    // =========================================================================

    fn kv_commit(&self, session: &mut Session) -> Result<()> {
        let request = Self::kv_request(Method::Post, session)
            .query(AUTOCOMMIT_PARAM, Mode::Immediate.autocommit_flag())
            .flag(FINALIZE_PARAM);
        self.control(session, request)
    }

    fn kv_rollback(&self, session: &mut Session) -> Result<()> {
        let request = Self::kv_request(Method::Post, session)
            .query(AUTOCOMMIT_PARAM, Mode::Staged.autocommit_flag())
            .query(CANCEL_PARAM, "1");
        self.control(session, request)
    }

    fn close(&self, mut session: Session) -> Result<()> {
        if session.in_transaction() {
            self.kv_commit(&mut session)?;
        }

        let path = session.path().clone();
        let request = HttpRequest::new(Method::Head, path.url_path())
            .query("comp", COMP_STREAM_SESSION)
            .flag(FINALIZE_PARAM);
        if let Err(e) = self.send(request, &Target::Object(&path)) {
            tracing::debug!("Closing stream session on {}: {}", path, e);
        }
        Ok(())
    }
}
