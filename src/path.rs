//! Addressing helpers
//!
//! Bucket/object name validation, endpoint normalisation and request URL
//! assembly.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EdgeError, Result};
use crate::types::DEFAULT_EDGEX_PORT;

/// Validate a bucket name: trimmed, non-empty, no `/`
pub fn bucket_name(bucket: &str) -> Result<String> {
    let bucket = bucket.trim();
    if bucket.is_empty() || bucket.contains('/') {
        return Err(EdgeError::InvalidArgument(format!(
            "Invalid bucket name `{}`",
            bucket
        )));
    }
    Ok(bucket.to_string())
}

/// Identity of an object: `(bucket, name)`
///
/// Ordering is by bucket, then name, so a sorted map of paths keeps each
/// bucket's objects contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectPath {
    bucket: String,
    object: String,
}

impl ObjectPath {
    /// Build a path from trimmed, non-empty bucket and object names
    pub fn new(bucket: &str, object: &str) -> Result<Self> {
        let bucket = bucket_name(bucket)?;
        let object = object.trim();
        if object.is_empty() {
            return Err(EdgeError::InvalidArgument(format!(
                "Invalid object name: `{}`",
                object
            )));
        }
        Ok(Self {
            bucket,
            object: object.to_string(),
        })
    }

    /// Parse `bucket/object`; the object part may itself contain `/`
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim_start_matches('/');
        match path.split_once('/') {
            Some((bucket, object)) => Self::new(bucket, object),
            None => Err(EdgeError::InvalidArgument(format!(
                "Invalid object path `{}`",
                path
            ))),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Absolute request path, `/bucket/object`
    pub fn url_path(&self) -> String {
        format!("/{}/{}", self.bucket, self.object)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}

// =============================================================================
// Endpoint Normalisation
// =============================================================================

/// Reduce an endpoint to `scheme://host:port`
///
/// - Missing scheme → `http`
/// - Missing host → `localhost`
/// - Missing port → 3000
/// - Path, query and fragment are dropped
pub fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let mut url = Url::parse(&with_scheme)?;

    if url.host_str().map_or(true, str::is_empty) {
        url.set_host(Some("localhost"))?;
    }

    if url.port().is_none() && !has_explicit_port(&with_scheme) {
        url.set_port(Some(DEFAULT_EDGEX_PORT))
            .map_err(|_| EdgeError::InvalidArgument(format!("Endpoint `{}` cannot carry a port", endpoint)))?;
    }

    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Whether the authority part of `scheme://authority/...` names a port.
///
/// `Url::port()` hides ports equal to the scheme default, so `http://h:80`
/// has to be detected from the raw text.
fn has_explicit_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    // IPv6 literals: only a colon after the closing bracket is a port
    let tail = host_port.rsplit_once(']').map_or(host_port, |(_, tail)| tail);
    tail.contains(':')
}

// =============================================================================
// Request URL
// =============================================================================

/// Request URL: a normalized endpoint plus path and query options
#[derive(Debug, Clone)]
pub struct S3xUrl {
    url: Url,
}

impl S3xUrl {
    /// Resolve `path` against the endpoint
    pub fn new(base: &Url, path: &str) -> Self {
        let mut url = base.clone();
        url.set_path(path);
        Self { url }
    }

    /// Append query options in order. Empty values render as `name=`.
    pub fn add_options<'a, I>(&mut self, options: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut pairs = self.url.query_pairs_mut();
        for (name, value) in options {
            pairs.append_pair(name, value);
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl fmt::Display for S3xUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
