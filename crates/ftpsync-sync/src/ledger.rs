//! Persisted content-hash ledger
//!
//! The ledger maps remote file paths to the digest of the content last
//! uploaded or downloaded for them. It lives on the remote side as a single
//! JSON object so that any machine syncing against the same remote root sees
//! the same history.

use ftpsync_remote::RemoteClient;
use ftpsync_types::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Default ledger file name, placed at the remote root
pub const DEFAULT_LEDGER_NAME: &str = ".MD5HASHES";

/// Remote path to digest mapping with change tracking
#[derive(Debug, Clone)]
pub struct HashLedger {
    remote_path: String,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl HashLedger {
    /// Create an empty ledger stored at `remote_path`
    pub fn new<S: Into<String>>(remote_path: S) -> Self {
        Self {
            remote_path: remote_path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Remote location of the ledger object
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Replace the in-memory entries with the remote ledger object.
    ///
    /// A server rejection of the download means there is no ledger yet.
    pub async fn load<C>(&mut self, client: &mut C) -> Result<()>
    where
        C: RemoteClient + ?Sized,
    {
        let mut data = Vec::new();
        match client.retrieve(&self.remote_path, &mut data).await {
            Ok(_) => {}
            Err(e) if e.is_rejection() => {
                debug!("No ledger at {}, starting empty", self.remote_path);
                self.entries.clear();
                self.dirty = false;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.entries = if data.iter().all(u8::is_ascii_whitespace) {
            BTreeMap::new()
        } else {
            serde_json::from_slice(&data).map_err(|e| {
                Error::ledger(format!("Failed to parse {}: {}", self.remote_path, e))
            })?
        };
        self.dirty = false;

        info!("Loaded {} ledger entries from {}", self.entries.len(), self.remote_path);
        Ok(())
    }

    /// Record the digest of `path`
    pub fn register_hash<P: Into<String>, D: Into<String>>(&mut self, path: P, digest: D) {
        let path = path.into();
        let digest = digest.into();
        if self.entries.get(&path) != Some(&digest) {
            debug!("Registered {} = {}", path, digest);
            self.entries.insert(path, digest);
            self.dirty = true;
        }
    }

    /// Forget `path`, returning its digest if it was tracked
    pub fn unregister_hash(&mut self, path: &str) -> Option<String> {
        let removed = self.entries.remove(path);
        if removed.is_some() {
            debug!("Unregistered {}", path);
            self.dirty = true;
        }
        removed
    }

    /// Recorded digest of `path`
    pub fn get_hash(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Whether `path` is tracked
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Tracked paths strictly below the directory `prefix`
    pub fn tracked_under(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.entries
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the in-memory entries differ from the last load or flush
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All entries, ordered by path
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Write the ledger object if it changed, returning whether it was written
    pub async fn flush<C>(&mut self, client: &mut C) -> Result<bool>
    where
        C: RemoteClient + ?Sized,
    {
        if !self.dirty {
            return Ok(false);
        }

        let data = serde_json::to_vec(&self.entries)
            .map_err(|e| Error::ledger(format!("Failed to serialize ledger: {}", e)))?;
        client.store(&self.remote_path, &mut data.as_slice()).await?;

        self.dirty = false;
        debug!("Flushed {} ledger entries to {}", self.entries.len(), self.remote_path);
        Ok(true)
    }
}
