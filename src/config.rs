//! Configuration for EdgeKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::types::ObjectOptions;

/// Default S3X endpoint (scheme and port are filled in when missing)
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// S3X endpoint, `scheme://host:port`. Path and query are discarded.
    pub endpoint: String,

    /// Request timeout (milliseconds)
    pub timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------
    /// S3 authentication key
    pub auth_key: String,

    /// S3 authentication secret
    pub secret: String,

    // -------------------------------------------------------------------------
    // Object Defaults
    // -------------------------------------------------------------------------
    /// Options used by `object_create` when the caller passes none
    pub object_options: ObjectOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: 45_000,
            auth_key: String::new(),
            secret: String::new(),
            object_options: ObjectOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the S3X endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the request timeout (in milliseconds)
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set the authentication key and secret
    pub fn credentials(mut self, auth_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.auth_key = auth_key.into();
        self.config.secret = secret.into();
        self
    }

    /// Set the default object creation options
    pub fn object_options(mut self, options: ObjectOptions) -> Self {
        self.config.object_options = options;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration for the in-memory reference store
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Snapshot file. `None` keeps the store purely in memory.
    pub snapshot_path: Option<PathBuf>,

    /// When snapshots are written
    pub snapshot_strategy: SnapshotStrategy,
}

/// Snapshot write strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotStrategy {
    /// Write the snapshot inside the store lock after every mutation
    #[default]
    EveryWrite,

    /// Hand snapshots to a writer thread; the latest pending one wins
    Background,
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Persist snapshots to the given file
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = Some(path.into());
        self
    }

    /// Set the snapshot strategy
    pub fn snapshot_strategy(mut self, strategy: SnapshotStrategy) -> Self {
        self.config.snapshot_strategy = strategy;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
