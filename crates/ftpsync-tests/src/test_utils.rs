//! Unified test utilities for ftpsync integration tests

use ftpsync_config::SyncConfig;
use ftpsync_remote::{MemoryRemote, RemoteOp};
use ftpsync_sync::{Digester, PathMapper, SyncEngine};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Remote directory every fixture mirrors into
pub const REMOTE_ROOT: &str = "/r";

/// Remote path of the ledger object for the default configuration
pub const LEDGER_PATH: &str = "/r/.MD5HASHES";

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Repeating structured bytes, similar to real file content
    Realistic,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Realistic => (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect(),
    }
}

/// Hex MD5 digest, as recorded in the default ledger
pub fn md5_hex(data: &[u8]) -> String {
    Digester::default().digest_bytes(data)
}

/// A temporary local tree paired with an in-memory remote whose root exists
pub struct SyncFixture {
    /// Local side
    pub local: TempDir,
    /// Remote side; clones share state with the one handed to engines
    pub remote: MemoryRemote,
}

impl SyncFixture {
    /// Empty local tree, empty remote root
    pub fn new() -> Self {
        let local = TempDir::new().expect("Failed to create temp dir");
        let remote = MemoryRemote::new();
        remote.put_dir(REMOTE_ROOT);
        Self { local, remote }
    }

    /// Local root directory
    pub fn local_root(&self) -> &Path {
        self.local.path()
    }

    /// Local path of a relative entry
    pub fn local_path(&self, relative: &str) -> PathBuf {
        self.local.path().join(relative)
    }

    /// Write a local file, creating parent directories
    pub fn write_local(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.local_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Remote path of a relative entry
    pub fn remote_path(relative: &str) -> String {
        format!("{}/{}", REMOTE_ROOT, relative)
    }

    /// Engine with the default configuration, not yet started
    pub fn engine(&self) -> SyncEngine<MemoryRemote> {
        self.engine_with(&SyncConfig::default())
    }

    /// Engine with a custom configuration, not yet started
    pub fn engine_with(&self, config: &SyncConfig) -> SyncEngine<MemoryRemote> {
        SyncEngine::new(
            self.remote.clone(),
            PathMapper::new(self.local.path(), REMOTE_ROOT),
            config,
        )
    }

    /// Store a ledger object remotely, as a previous session would have
    pub fn seed_ledger(&self, entries: &[(&str, &str)]) {
        let map: BTreeMap<&str, &str> = entries.iter().copied().collect();
        let json = serde_json::to_vec(&map).expect("Failed to encode ledger");
        self.remote.put_file(LEDGER_PATH, json);
    }

    /// Parsed content of the remote ledger object, empty when absent
    pub fn remote_ledger(&self) -> BTreeMap<String, String> {
        self.remote
            .file(LEDGER_PATH)
            .map(|bytes| serde_json::from_slice(&bytes).expect("Ledger is not valid JSON"))
            .unwrap_or_default()
    }

    /// Number of recorded operations equal to `op`
    pub fn count(&self, op: &RemoteOp) -> usize {
        self.remote.ops().iter().filter(|seen| *seen == op).count()
    }

    /// Position of the first recorded operation equal to `op`
    pub fn position(&self, op: &RemoteOp) -> Option<usize> {
        self.remote.ops().iter().position(|seen| seen == op)
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}
