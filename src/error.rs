//! Error types for EdgeKV
//!
//! Provides a unified error type for all client and store operations.

use thiserror::Error;

/// Result type alias using EdgeError
pub type Result<T> = std::result::Result<T, EdgeError>;

/// Unified error type for EdgeKV operations
#[derive(Debug, Error)]
pub enum EdgeError {
    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object already exists: {0}")]
    ObjectAlreadyExists(String),

    #[error("Key not found: {object}[{key}]")]
    KeyNotFound { object: String, key: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Payload Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Session conflict: {0}")]
    SessionConflict(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error (status {status}): {message}")]
    Transport { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EdgeError {
    fn from(e: serde_json::Error) -> Self {
        EdgeError::Encoding(e.to_string())
    }
}

impl From<bincode::Error> for EdgeError {
    fn from(e: bincode::Error) -> Self {
        EdgeError::Serialization(e.to_string())
    }
}

impl From<quick_xml::DeError> for EdgeError {
    fn from(e: quick_xml::DeError) -> Self {
        EdgeError::Xml(e.to_string())
    }
}

impl EdgeError {
    /// True for the not-found family (bucket, object, key)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EdgeError::BucketNotFound(_) | EdgeError::ObjectNotFound(_) | EdgeError::KeyNotFound { .. }
        )
    }

    /// True when the request may have reached the server before failing.
    ///
    /// Validation and encoding failures are raised before anything is sent
    /// and leave remote state untouched; these are not ambiguous. A status
    /// error or a connection dropped mid-request may or may not have been
    /// applied, so the caller decides between retrying and rolling back.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            EdgeError::Transport { .. } => true,
            EdgeError::Http(e) => !e.is_connect() && !e.is_builder(),
            _ => false,
        }
    }
}
