//! Filesystem watcher feeding the debouncer

use crate::debounce::EventDebouncer;
use crate::path::is_partial_download;
use ftpsync_types::{EntryKind, Error, EventKind, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind as NotifyKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A change worth recording, derived from one raw notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// A single path changed
    Change {
        /// Affected path
        path: PathBuf,
        /// What happened
        kind: EventKind,
        /// File or directory
        entry: EntryKind,
    },
    /// A path moved within the watched tree
    Rename {
        /// Old path
        from: PathBuf,
        /// New path
        to: PathBuf,
        /// File or directory
        entry: EntryKind,
    },
}

fn entry_on_disk(path: &Path) -> EntryKind {
    EntryKind::from_is_dir(path.is_dir())
}

/// Map a raw notification onto debouncer records.
///
/// Access and metadata-only events produce nothing, as do events on `root`
/// itself and on in-flight downloads. A download renamed into place is
/// reported as a modification of its target.
pub fn classify(event: &Event, root: &Path) -> Vec<Observed> {
    classify_raw(event, root)
        .into_iter()
        .filter_map(without_partials)
        .collect()
}

fn without_partials(observed: Observed) -> Option<Observed> {
    match observed {
        Observed::Change { ref path, .. } if is_partial_download(path) => None,
        Observed::Rename { from, to, entry } => {
            match (is_partial_download(&from), is_partial_download(&to)) {
                (false, false) => Some(Observed::Rename { from, to, entry }),
                (true, false) => Some(Observed::Change {
                    path: to,
                    kind: EventKind::Modified,
                    entry,
                }),
                (false, true) => Some(Observed::Change {
                    path: from,
                    kind: EventKind::Deleted,
                    entry,
                }),
                (true, true) => None,
            }
        }
        other => Some(other),
    }
}

fn classify_raw(event: &Event, root: &Path) -> Vec<Observed> {
    let change = |path: &PathBuf, kind: EventKind, entry: EntryKind| Observed::Change {
        path: path.clone(),
        kind,
        entry,
    };
    let paths = event.paths.iter().filter(|path| path.as_path() != root);

    match &event.kind {
        NotifyKind::Create(create) => paths
            .map(|path| {
                let entry = match create {
                    CreateKind::File => EntryKind::File,
                    CreateKind::Folder => EntryKind::Directory,
                    _ => entry_on_disk(path),
                };
                change(path, EventKind::Created, entry)
            })
            .collect(),

        NotifyKind::Remove(remove) => {
            let entry = match remove {
                RemoveKind::Folder => EntryKind::Directory,
                _ => EntryKind::File,
            };
            paths.map(|path| change(path, EventKind::Deleted, entry)).collect()
        }

        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            if from == root || to == root {
                return Vec::new();
            }
            vec![Observed::Rename {
                from: from.clone(),
                to: to.clone(),
                entry: entry_on_disk(to),
            }]
        }

        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .map(|path| change(path, EventKind::Deleted, EntryKind::File))
            .collect(),

        NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .map(|path| change(path, EventKind::Created, entry_on_disk(path)))
            .collect(),

        NotifyKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| {
                if path.exists() {
                    change(path, EventKind::Created, entry_on_disk(path))
                } else {
                    change(path, EventKind::Deleted, EntryKind::File)
                }
            })
            .collect(),

        NotifyKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),

        NotifyKind::Modify(_) => paths
            .map(|path| change(path, EventKind::Modified, entry_on_disk(path)))
            .collect(),

        NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => Vec::new(),
    }
}

/// Record the classified form of `event` in `debouncer`
pub fn dispatch(event: &Event, root: &Path, debouncer: &EventDebouncer) {
    for observed in classify(event, root) {
        match observed {
            Observed::Change { path, kind, entry } => {
                debug!("{} {}: {}", kind, entry, path.display());
                debouncer.record(path, kind, entry);
            }
            Observed::Rename { from, to, entry } => {
                debug!("Moved {}: {} -> {}", entry, from.display(), to.display());
                debouncer.record_rename(from, to, entry);
            }
        }
    }
}

/// Recursive watch on the local root; dropping it stops watching
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher").field("root", &self.root).finish()
    }
}

impl FsWatcher {
    /// Start watching `root`, recording every change in `debouncer`
    pub fn start(root: &Path, debouncer: EventDebouncer) -> Result<Self> {
        let root = root.to_path_buf();
        let callback_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => dispatch(&event, &callback_root, &debouncer),
            Err(e) => warn!("Watch error: {}", e),
        })
        .map_err(|e| Error::sync(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::sync(format!("Failed to watch '{}': {}", root.display(), e)))?;

        info!("Watching {}", root.display());
        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    /// Watched directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}
