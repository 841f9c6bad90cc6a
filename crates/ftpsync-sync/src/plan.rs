//! Pure reconciliation planning
//!
//! Given snapshots of both trees, decide which files need a digest check,
//! which are only on one side, and which directories are missing where.
//! Nothing here touches the filesystem or the network.

use crate::path::{remote_depth, PathMapper};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Partition of the files seen on either side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Present on both sides; upload when the local digest differs from the ledger
    pub check: BTreeSet<String>,
    /// Present only remotely
    pub download: BTreeSet<String>,
    /// Present only locally
    pub upload: BTreeSet<String>,
}

impl ReconcilePlan {
    /// Partition relative file paths, leaving out the ledger object
    pub fn compute(
        local: &BTreeSet<String>,
        remote: &BTreeSet<String>,
        ledger_name: &str,
    ) -> Self {
        let keep = |path: &&String| path.as_str() != ledger_name;

        Self {
            check: local.intersection(remote).filter(keep).cloned().collect(),
            download: remote.difference(local).filter(keep).cloned().collect(),
            upload: local.difference(remote).filter(keep).cloned().collect(),
        }
    }

    /// Total number of files covered
    pub fn len(&self) -> usize {
        self.check.len() + self.download.len() + self.upload.len()
    }

    /// Whether neither side has any file
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directories that exist on one side only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryPlan {
    /// Remote paths of local directories missing remotely, shallowest first
    pub create_remote: Vec<String>,
    /// Local paths of remote directories missing locally, shallowest first
    pub create_local: Vec<PathBuf>,
}

impl DirectoryPlan {
    /// Compare directory sets through the path mapper
    pub fn compute(
        mapper: &PathMapper,
        local_dirs: &BTreeSet<PathBuf>,
        remote_dirs: &BTreeSet<String>,
    ) -> Self {
        let mut create_remote: Vec<String> = local_dirs
            .iter()
            .map(|dir| mapper.to_remote(dir))
            .filter(|remote| !remote_dirs.contains(remote))
            .collect();
        create_remote.sort_by_key(|path| (remote_depth(path), path.clone()));

        let mut create_local: Vec<PathBuf> = remote_dirs
            .iter()
            .map(|dir| mapper.to_local(dir))
            .filter(|local| !local_dirs.contains(local))
            .collect();
        create_local.sort_by_key(|path| (path.components().count(), path.clone()));

        Self {
            create_remote,
            create_local,
        }
    }
}
