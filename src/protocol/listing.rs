//! XML listing documents
//!
//! Bucket and object listings follow the S3 shapes:
//!
//! ```text
//! <ListAllMyBucketsResult>
//!   <Buckets>
//!     <Bucket><Name>bk1</Name><CreationDate>...</CreationDate></Bucket>
//!   </Buckets>
//! </ListAllMyBucketsResult>
//!
//! <ListBucketResult>
//!   <Contents><Key>o1</Key><LastModified>...</LastModified><Size>0</Size></Contents>
//! </ListBucketResult>
//! ```
//!
//! Failed requests may carry `<Error><Code>..</Code><Message>..</Message></Error>`.

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};
use crate::types::{Bucket, ObjectEntry};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "ListAllMyBucketsResult")]
struct ListAllMyBucketsResult {
    #[serde(rename = "Buckets", default)]
    buckets: BucketList,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BucketList {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<Bucket>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectEntry>,
}

/// Error document returned with non-2xx statuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Error")]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Error codes understood by the clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoSuchBucket,
    NoSuchObject,
    NoSuchKey,
    BucketAlreadyExists,
    ObjectAlreadyExists,
    InvalidArgument,
    MalformedPayload,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoSuchBucket => "NoSuchBucket",
            ErrorCode::NoSuchObject => "NoSuchObject",
            ErrorCode::NoSuchKey => "NoSuchKey",
            ErrorCode::BucketAlreadyExists => "BucketAlreadyExists",
            ErrorCode::ObjectAlreadyExists => "ObjectAlreadyExists",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::MalformedPayload => "MalformedPayload",
            ErrorCode::InternalError => "InternalError",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        let code = match code {
            "NoSuchBucket" => ErrorCode::NoSuchBucket,
            "NoSuchObject" => ErrorCode::NoSuchObject,
            "NoSuchKey" => ErrorCode::NoSuchKey,
            "BucketAlreadyExists" => ErrorCode::BucketAlreadyExists,
            "ObjectAlreadyExists" => ErrorCode::ObjectAlreadyExists,
            "InvalidArgument" => ErrorCode::InvalidArgument,
            "MalformedPayload" => ErrorCode::MalformedPayload,
            "InternalError" => ErrorCode::InternalError,
            _ => return None,
        };
        Some(code)
    }

    /// HTTP status this code is reported with
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::NoSuchBucket | ErrorCode::NoSuchObject | ErrorCode::NoSuchKey => 404,
            ErrorCode::BucketAlreadyExists | ErrorCode::ObjectAlreadyExists => 409,
            ErrorCode::InvalidArgument | ErrorCode::MalformedPayload => 400,
            ErrorCode::InternalError => 500,
        }
    }
}

fn to_xml<T: Serialize>(document: &T) -> Result<String> {
    quick_xml::se::to_string(document).map_err(|e| EdgeError::Xml(e.to_string()))
}

// =============================================================================
// Encoding
// =============================================================================

pub fn encode_bucket_list(buckets: &[Bucket]) -> Result<String> {
    to_xml(&ListAllMyBucketsResult {
        buckets: BucketList {
            bucket: buckets.to_vec(),
        },
    })
}

pub fn encode_object_list(objects: &[ObjectEntry]) -> Result<String> {
    to_xml(&ListBucketResult {
        contents: objects.to_vec(),
    })
}

pub fn encode_error(code: ErrorCode, message: &str) -> Result<String> {
    to_xml(&ErrorBody {
        code: code.as_str().to_string(),
        message: message.to_string(),
    })
}

// =============================================================================
// Decoding
// =============================================================================

pub fn decode_bucket_list(xml: &str) -> Result<Vec<Bucket>> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: ListAllMyBucketsResult = quick_xml::de::from_str(xml)?;
    Ok(document.buckets.bucket)
}

pub fn decode_object_list(xml: &str) -> Result<Vec<ObjectEntry>> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: ListBucketResult = quick_xml::de::from_str(xml)?;
    Ok(document.contents)
}

/// Parse an error body; `None` when the body is not an error document
pub fn decode_error(xml: &str) -> Option<ErrorBody> {
    quick_xml::de::from_str(xml).ok()
}
