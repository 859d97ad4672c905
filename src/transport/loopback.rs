//! Loopback transport
//!
//! Serves S3X requests from a local [`MemoryStore`] without a network hop.
//!
//! ## Dispatch
//! ```text
//! /            GET                      bucket list (XML)
//! /{b}         PUT | HEAD | DELETE      bucket lifecycle
//! /{b}         GET                      object list (XML)
//! /{b}/{o}     POST  + oflags header    object create
//! /{b}/{o}     POST  comp=kv            upsert / batch / commit / rollback
//! /{b}/{o}     DELETE comp=kv           key delete / batch delete
//! /{b}/{o}     DELETE comp=del          object delete
//! /{b}/{o}     GET   comp=kvget|kv      key read / key listing
//! /{b}/{o}     HEAD                     object existence
//! ```
//!
//! Store errors become non-2xx responses with an XML `<Error>` body, so a
//! client sees the same shapes a remote endpoint would produce.

use std::sync::Arc;

use crate::error::{EdgeError, Result};
use crate::path::ObjectPath;
use crate::protocol::{
    decode_csv_upserts, decode_json_deletes, decode_json_upserts, encode_bucket_list,
    encode_error, encode_object_list, ErrorCode, Mode, Mutation, AUTOCOMMIT_PARAM, CANCEL_PARAM,
    COMP_DELETE, COMP_KV, COMP_KV_GET, COMP_STREAM_SESSION, CONTENT_TYPE_CSV, CONTENT_TYPE_XML,
    FINALIZE_PARAM, OBJECT_OFLAGS_HEADER, SESSION_ID_HEADER,
};
use crate::session::SessionId;
use crate::store::MemoryStore;
use crate::types::{ListFormat, ListQuery};

use super::{HttpRequest, HttpResponse, Method, Transport};

/// Transport answering requests from an in-process store
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    store: Arc<MemoryStore>,
}

impl LoopbackTransport {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let path = request.path.trim_start_matches('/');
        if path.is_empty() {
            return self.root(request);
        }
        match path.split_once('/') {
            None => self.bucket(request, path),
            Some((bucket, object)) => self.object(request, &ObjectPath::new(bucket, object)?),
        }
    }

    // =========================================================================
    // Root and Buckets
    // =========================================================================

    fn root(&self, request: &HttpRequest) -> Result<HttpResponse> {
        match request.method {
            Method::Get => Ok(xml(encode_bucket_list(&self.store.list_buckets())?)),
            other => Err(unsupported(other, "/")),
        }
    }

    fn bucket(&self, request: &HttpRequest, bucket: &str) -> Result<HttpResponse> {
        match request.method {
            Method::Put => {
                self.store.create_bucket(bucket)?;
                Ok(HttpResponse::ok())
            }
            Method::Head => {
                if self.store.bucket_exists(bucket)? {
                    Ok(HttpResponse::ok())
                } else {
                    Err(EdgeError::BucketNotFound(bucket.to_string()))
                }
            }
            Method::Delete => {
                self.store.delete_bucket(bucket)?;
                Ok(HttpResponse::ok())
            }
            Method::Get => {
                let max_keys = parse_count(request, "max-keys")?;
                let objects = self.store.list_objects(
                    bucket,
                    request.query_param("marker").unwrap_or(""),
                    request.query_param("prefix").unwrap_or(""),
                    max_keys,
                )?;
                Ok(xml(encode_object_list(&objects)?))
            }
            other => Err(unsupported(other, bucket)),
        }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    fn object(&self, request: &HttpRequest, path: &ObjectPath) -> Result<HttpResponse> {
        let comp = request.query_param("comp").unwrap_or("");

        match request.method {
            Method::Post if request.header_value(OBJECT_OFLAGS_HEADER).is_some()
                || comp == COMP_STREAM_SESSION =>
            {
                self.store.create_object(path)?;
                Ok(HttpResponse::ok())
            }
            Method::Post if comp == COMP_KV => self.post_kv(request, path),
            Method::Delete if comp == COMP_DELETE => {
                self.store.delete_object(path)?;
                Ok(HttpResponse::ok())
            }
            Method::Delete if comp == COMP_KV => self.delete_kv(request, path),
            Method::Get if comp == COMP_KV_GET => {
                let key = required(request, "key")?;
                Ok(HttpResponse::ok().with_body(self.store.get(path, key)?))
            }
            Method::Get if comp == COMP_KV => self.list_kv(request, path),
            Method::Head => {
                if self.store.object_exists(path) {
                    Ok(HttpResponse::ok())
                } else {
                    Err(EdgeError::ObjectNotFound(path.to_string()))
                }
            }
            other => Err(unsupported(other, &path.to_string())),
        }
    }

    fn post_kv(&self, request: &HttpRequest, path: &ObjectPath) -> Result<HttpResponse> {
        if request.has_query(CANCEL_PARAM) {
            self.store.rollback(path)?;
            return Ok(HttpResponse::ok());
        }

        let mutations = match request.query_param("key") {
            Some(key) => vec![Mutation::upsert(key, request.body_text())],
            None => {
                let content_type = request.header_value("Content-Type").unwrap_or("");
                if content_type.starts_with(CONTENT_TYPE_CSV) {
                    decode_csv_upserts(&request.body_text())?
                } else {
                    decode_json_upserts(&request.body_text())?
                }
            }
        };
        self.mutate(request, path, mutations)
    }

    fn delete_kv(&self, request: &HttpRequest, path: &ObjectPath) -> Result<HttpResponse> {
        let mutations = match request.query_param("key") {
            Some(key) => vec![Mutation::delete(key)],
            None => decode_json_deletes(&request.body_text())?,
        };
        self.mutate(request, path, mutations)
    }

    fn mutate(
        &self,
        request: &HttpRequest,
        path: &ObjectPath,
        mutations: Vec<Mutation>,
    ) -> Result<HttpResponse> {
        let session = request
            .header_value(SESSION_ID_HEADER)
            .and_then(SessionId::from_wire);
        let token = self
            .store
            .mutate(path, request_mode(request), mutations, session.as_ref())?;

        Ok(match token {
            Some(token) => HttpResponse::ok().with_header(SESSION_ID_HEADER, token.as_str()),
            None => HttpResponse::ok(),
        })
    }

    fn list_kv(&self, request: &HttpRequest, path: &ObjectPath) -> Result<HttpResponse> {
        let format = ListFormat::from_content_type(
            request
                .header_value("Content-Type")
                .unwrap_or(ListFormat::Json.content_type()),
        );
        let query = ListQuery::new()
            .from_key(request.query_param("key").unwrap_or(""))
            .prefix(request.query_param("pattern").unwrap_or(""))
            .max_count(parse_count(request, "maxresults")?)
            .format(format)
            .include_values(request.query_param("values") == Some("1"));

        Ok(HttpResponse::ok()
            .with_header("Content-Type", format.content_type())
            .with_body(self.store.list(path, &query)?))
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        tracing::trace!("loopback {} {}", request.method, request.path);
        Ok(self
            .dispatch(request)
            .unwrap_or_else(|e| error_response(request.method, &e)))
    }
}

/// Staged only when autocommit is explicitly off and no `finalize` is given
fn request_mode(request: &HttpRequest) -> Mode {
    let staged = request.query_param(AUTOCOMMIT_PARAM) == Some("0")
        && !request.has_query(FINALIZE_PARAM);
    Mode::from_more(staged)
}

fn required<'a>(request: &'a HttpRequest, name: &str) -> Result<&'a str> {
    request
        .query_param(name)
        .ok_or_else(|| EdgeError::InvalidArgument(format!("Missing `{}` parameter", name)))
}

fn parse_count(request: &HttpRequest, name: &str) -> Result<usize> {
    match request.query_param(name) {
        None | Some("") => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| EdgeError::InvalidArgument(format!("`{}` must be a count, got `{}`", name, raw))),
    }
}

fn unsupported(method: Method, target: &str) -> EdgeError {
    EdgeError::InvalidArgument(format!("Unsupported request: {} {}", method, target))
}

fn xml(body: String) -> HttpResponse {
    HttpResponse::ok()
        .with_header("Content-Type", CONTENT_TYPE_XML)
        .with_body(body)
}

fn error_code(error: &EdgeError) -> ErrorCode {
    match error {
        EdgeError::BucketNotFound(_) => ErrorCode::NoSuchBucket,
        EdgeError::ObjectNotFound(_) => ErrorCode::NoSuchObject,
        EdgeError::KeyNotFound { .. } => ErrorCode::NoSuchKey,
        EdgeError::BucketAlreadyExists(_) => ErrorCode::BucketAlreadyExists,
        EdgeError::ObjectAlreadyExists(_) => ErrorCode::ObjectAlreadyExists,
        EdgeError::InvalidArgument(_) => ErrorCode::InvalidArgument,
        EdgeError::Encoding(_) => ErrorCode::MalformedPayload,
        _ => ErrorCode::InternalError,
    }
}

/// `<Message>` text; the client rebuilds the variant from the code
fn error_message(error: &EdgeError) -> String {
    match error {
        EdgeError::InvalidArgument(message) | EdgeError::Encoding(message) => message.clone(),
        EdgeError::Transport { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn error_response(method: Method, error: &EdgeError) -> HttpResponse {
    let code = error_code(error);
    tracing::debug!("loopback error {}: {}", code.as_str(), error);

    let response = HttpResponse::new(code.status());
    if method == Method::Head {
        return response;
    }
    let message = error_message(error);
    match encode_error(code, &message) {
        Ok(body) => response
            .with_header("Content-Type", CONTENT_TYPE_XML)
            .with_body(body),
        Err(e) => {
            tracing::warn!("Failed to encode error body: {}", e);
            response.with_body(message)
        }
    }
}
