//! Local and remote tree enumeration

use crate::path::{is_partial_download, remote_join, remote_relative};
use ftpsync_remote::RemoteClient;
use ftpsync_types::{EntryKind, Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Snapshot of the local tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTree {
    /// Files relative to the local root, `/`-separated
    pub files: BTreeSet<String>,
    /// Absolute paths of every directory below the local root
    pub dirs: BTreeSet<PathBuf>,
}

/// Snapshot of the remote tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTree {
    /// File paths, absolute or relative to the remote root
    pub files: BTreeSet<String>,
    /// Absolute paths of every directory below the remote root
    pub dirs: BTreeSet<String>,
    /// Whether the server accepted the listing of the root itself
    pub root_found: bool,
}

/// Enumerate the local tree below `root`.
///
/// Entries that cannot be read are logged and skipped. Symbolic links are
/// not followed.
pub fn scan_local(root: &Path) -> Result<LocalTree> {
    let metadata = std::fs::metadata(root).map_err(|e| Error::local_io(root, &e))?;
    if !metadata.is_dir() {
        return Err(Error::Io {
            message: format!("Local root is not a directory: {}", root.display()),
        });
    }

    let mut tree = LocalTree::default();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            tree.dirs.insert(entry.path().to_path_buf());
        } else if is_partial_download(entry.path()) {
            debug!("Skipping in-flight download: {}", entry.path().display());
        } else if file_type.is_file() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let relative: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            tree.files.insert(relative.join("/"));
        } else {
            debug!("Skipping special file: {}", entry.path().display());
        }
    }

    info!(
        "Scanned {} files and {} directories in '{}'",
        tree.files.len(),
        tree.dirs.len(),
        root.display()
    );
    Ok(tree)
}

/// Enumerate the remote tree below `root`.
///
/// With `relative` set, file paths are reported relative to `root`. A
/// directory whose listing the server rejects counts as empty; transport
/// failures abort the scan.
pub async fn scan_remote<C>(client: &mut C, root: &str, relative: bool) -> Result<RemoteTree>
where
    C: RemoteClient + ?Sized,
{
    let mut tree = RemoteTree::default();
    let mut pending = vec![root.to_string()];

    while let Some(directory) = pending.pop() {
        let entries = match client.list_directory(&directory).await {
            Ok(entries) => {
                if directory == root {
                    tree.root_found = true;
                }
                entries
            }
            Err(e) if e.is_rejection() => {
                debug!("Listing of {} rejected, treating as empty: {}", directory, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        for entry in entries {
            let path = remote_join(&directory, &entry.name);
            match entry.kind {
                EntryKind::Directory => {
                    tree.dirs.insert(path.clone());
                    pending.push(path);
                }
                EntryKind::File => {
                    let path = if relative {
                        remote_relative(root, &path).to_string()
                    } else {
                        path
                    };
                    tree.files.insert(path);
                }
            }
        }
    }

    info!(
        "Scanned {} files and {} directories below {}",
        tree.files.len(),
        tree.dirs.len(),
        root
    );
    Ok(tree)
}
