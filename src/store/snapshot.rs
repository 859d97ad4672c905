//! Snapshot files
//!
//! Committed state of the whole store in one checksummed file. Staging
//! buffers and sessions are never persisted.
//!
//! ## File Format
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                 │
//! │   magic "EKVS" (4) | version (2) | crc32 (4)      │
//! │   payload length (4)                              │
//! ├───────────────────────────────────────────────────┤
//! │ Payload: bincode(Snapshot)                        │
//! └───────────────────────────────────────────────────┘
//! ```
//! All integers are little-endian. The CRC covers the payload only.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};
use crate::path::ObjectPath;
use crate::types::Bucket;

pub(crate) const MAGIC: &[u8; 4] = b"EKVS";
pub(crate) const VERSION: u16 = 1;
pub(crate) const HEADER_SIZE: usize = 14;

/// Committed key-value set of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub path: ObjectPath,

    /// RFC 3339 time of the last committed change
    pub last_modified: String,

    pub key_values: BTreeMap<String, String>,
}

/// Point-in-time copy of committed store state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub buckets: Vec<Bucket>,
    pub objects: Vec<ObjectRecord>,
}

impl Snapshot {
    /// Serialize with header and checksum
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let length = u32::try_from(payload.len())
            .map_err(|_| EdgeError::Serialization("Snapshot exceeds 4 GiB".to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&length.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse and verify an encoded snapshot
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EdgeError::Serialization(format!(
                "Snapshot too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(EdgeError::Serialization("Invalid snapshot magic".to_string()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(EdgeError::Serialization(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }

        let crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let length = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != length {
            return Err(EdgeError::Serialization(format!(
                "Snapshot length mismatch: header says {}, found {}",
                length,
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(EdgeError::Serialization("Snapshot checksum mismatch".to_string()));
        }

        Ok(bincode::deserialize(payload)?)
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = tmp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(&bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a snapshot; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(Self::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
