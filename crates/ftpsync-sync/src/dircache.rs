//! Remote directories known to exist

use crate::path::{remote_ancestors, remote_depth};
use ftpsync_remote::RemoteClient;
use ftpsync_types::Result;
use std::collections::HashSet;
use tracing::{debug, info};

/// Set of remote directories confirmed to exist, so that recursive creation
/// only issues make-directory for the missing tail of a path
#[derive(Debug, Clone, Default)]
pub struct DirectoryCache {
    known: HashSet<String>,
}

impl DirectoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every strict ancestor of `root` as existing.
    ///
    /// `root` itself is only recorded once a listing or creation confirms it.
    pub fn seed_ancestors(&mut self, root: &str) {
        let mut ancestors = remote_ancestors(root);
        ancestors.pop();
        self.known.extend(ancestors);
    }

    /// Record that `path` exists
    pub fn insert<S: Into<String>>(&mut self, path: S) -> bool {
        self.known.insert(path.into())
    }

    /// Whether `path` is known to exist
    pub fn contains(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    /// Forget `path`
    pub fn remove(&mut self, path: &str) -> bool {
        self.known.remove(path)
    }

    /// Cached directories strictly below `prefix`, deepest first
    pub fn subdirectories(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut below: Vec<String> = self
            .known
            .iter()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect();
        below.sort_by(|a, b| remote_depth(b).cmp(&remote_depth(a)).then_with(|| a.cmp(b)));
        below
    }

    /// Forget `prefix` and everything below it, returning how many entries went
    pub fn remove_tree(&mut self, prefix: &str) -> usize {
        let nested = format!("{}/", prefix.trim_end_matches('/'));
        let before = self.known.len();
        self.known
            .retain(|path| path != prefix && !path.starts_with(&nested));
        before - self.known.len()
    }

    /// Number of cached directories
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Create `path` and any missing ancestors remotely, returning how many
    /// directories were created
    pub async fn ensure_directory<C>(&mut self, client: &mut C, path: &str) -> Result<usize>
    where
        C: RemoteClient + ?Sized,
    {
        let mut created = 0;
        for prefix in remote_ancestors(path) {
            if self.known.contains(&prefix) {
                debug!("Directory {} already exists", prefix);
                continue;
            }

            info!("Creating directory {}", prefix);
            client.make_directory(&prefix).await?;
            self.known.insert(prefix);
            created += 1;
        }
        Ok(created)
    }
}
