//! Core data types for ftpsync
//!
//! Filesystem event vocabulary shared by the watcher and the sync loop, and the
//! counters reported by reconciliation passes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a path names a regular file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// Map a boolean "is directory" flag onto an entry kind
    pub fn from_is_dir(is_dir: bool) -> Self {
        if is_dir {
            Self::Directory
        } else {
            Self::File
        }
    }

    /// Check if this is a directory
    pub fn is_dir(self) -> bool {
        self == Self::Directory
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Kind of filesystem change observed for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventKind {
    /// Path appeared
    Created,
    /// Path content changed
    Modified,
    /// Path disappeared
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Content digest algorithm used for change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DigestAlgorithm {
    /// MD5, the format existing `.MD5HASHES` ledgers are written in
    #[default]
    Md5,
    /// BLAKE3
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Counters describing what a sync pass did to both trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncStats {
    /// Remote directories created
    pub remote_dirs_created: u64,
    /// Local directories created
    pub local_dirs_created: u64,
    /// Files uploaded that did not exist remotely
    pub files_uploaded: u64,
    /// Files re-uploaded because their digest changed
    pub files_updated: u64,
    /// Files downloaded from the remote tree
    pub files_downloaded: u64,
    /// Files whose digest matched the ledger
    pub files_unchanged: u64,
    /// Remote files deleted
    pub files_deleted: u64,
    /// Remote directories deleted
    pub dirs_deleted: u64,
    /// Per-path failures that were skipped
    pub failed: u64,
    /// Bytes sent to the remote
    pub bytes_uploaded: u64,
    /// Bytes received from the remote
    pub bytes_downloaded: u64,
}

impl SyncStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote mutations (creations, transfers, deletions)
    pub fn remote_mutations(&self) -> u64 {
        self.remote_dirs_created
            + self.files_uploaded
            + self.files_updated
            + self.files_deleted
            + self.dirs_deleted
    }

    /// Whether the pass touched either tree
    pub fn has_changes(&self) -> bool {
        self.remote_mutations() > 0 || self.local_dirs_created > 0 || self.files_downloaded > 0
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &SyncStats) {
        self.remote_dirs_created += other.remote_dirs_created;
        self.local_dirs_created += other.local_dirs_created;
        self.files_uploaded += other.files_uploaded;
        self.files_updated += other.files_updated;
        self.files_downloaded += other.files_downloaded;
        self.files_unchanged += other.files_unchanged;
        self.files_deleted += other.files_deleted;
        self.dirs_deleted += other.dirs_deleted;
        self.failed += other.failed;
        self.bytes_uploaded += other.bytes_uploaded;
        self.bytes_downloaded += other.bytes_downloaded;
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} updated, {} downloaded, {} unchanged, {} deleted, {} failed",
            self.files_uploaded,
            self.files_updated,
            self.files_downloaded,
            self.files_unchanged,
            self.files_deleted,
            self.failed
        )
    }
}
