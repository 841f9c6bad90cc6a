//! Configuration management system for ftpsync
//!
//! This crate provides layered configuration for the sync engine and its
//! command-line front end:
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: every loaded configuration is checked before use
//! - **Environment overrides**: `FTPSYNC__SECTION__KEY=value` overrides any file value
//! - **Defaults**: every option has a default, so no file is required
//!
//! # Examples
//!
//! ```rust
//! use ftpsync_config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ftpsync.yaml")
//!     .add_env_prefix("FTPSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Remote endpoint: {}:{}", config.remote.host, config.remote.port);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ftpsync_types::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for ftpsync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint configuration
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Synchronization engine configuration
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host name or address of the file-transfer server
    pub host: String,
    /// Control connection port
    pub port: u16,
    /// Login user name
    pub username: String,
    /// Login password
    pub password: String,
    /// Timeout for establishing connections, in milliseconds
    pub connect_timeout_ms: u64,
    /// Timeout for a single control or data exchange, in milliseconds
    pub io_timeout_ms: u64,
}

impl RemoteConfig {
    /// Connection establishment timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-exchange timeout
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// `host:port` string suitable for socket resolution
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2121,
            username: "anonymous".to_string(),
            password: "anonymous@".to_string(),
            connect_timeout_ms: 10_000,
            io_timeout_ms: 60_000,
        }
    }
}

/// Synchronization engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// File name of the hash ledger stored under the remote root
    pub ledger_name: String,
    /// Digest algorithm recorded in the ledger
    pub digest: DigestAlgorithm,
    /// Read size used while hashing files
    pub chunk_size: usize,
    /// How often the sync loop drains pending events, in milliseconds
    pub poll_interval_ms: u64,
    /// Quiet period a file must observe before its event is applied, in milliseconds
    pub settle_threshold_ms: u64,
    /// Delete the remote copy before re-uploading a changed file
    pub delete_before_store: bool,
}

impl SyncConfig {
    /// Poll interval of the sync loop
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Settle threshold for file events
    pub fn settle_threshold(&self) -> Duration {
        Duration::from_millis(self.settle_threshold_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ledger_name: ".MD5HASHES".to_string(),
            digest: DigestAlgorithm::Md5,
            chunk_size: 8 * 1024,
            poll_interval_ms: 100,
            settle_threshold_ms: 500,
            delete_before_store: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
