//! Translation between local and remote path conventions
//!
//! Local paths follow the host convention (`PathBuf`); remote paths are
//! `/`-separated strings. Nothing in the engine compares the two without
//! going through [`PathMapper`].

use std::path::{Component, Path, PathBuf};

/// Maps paths between a local root and a remote root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    local_root: PathBuf,
    remote_root: String,
}

impl PathMapper {
    /// Create a mapper for the given roots
    pub fn new<P: Into<PathBuf>, S: Into<String>>(local_root: P, remote_root: S) -> Self {
        let remote_root = remote_root.into();
        let remote_root = match remote_root.trim_end_matches('/') {
            "" if remote_root.starts_with('/') => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        Self {
            local_root: local_root.into(),
            remote_root,
        }
    }

    /// Local root directory
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Remote root directory
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Map a local path onto the remote tree.
    ///
    /// Paths outside the local root are mapped as if they were relative to it.
    pub fn to_remote(&self, local: &Path) -> String {
        let relative = local.strip_prefix(&self.local_root).unwrap_or(local);
        remote_join(&self.remote_root, &relative_segments(relative).join("/"))
    }

    /// Map a remote path onto the local tree.
    ///
    /// Paths outside the remote root are mapped as if they were relative to it.
    pub fn to_local(&self, remote: &str) -> PathBuf {
        remote_relative(&self.remote_root, remote)
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(self.local_root.clone(), |path, segment| path.join(segment))
    }
}

fn relative_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Join a relative `/`-separated path onto a remote base
pub fn remote_join(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        base.to_string()
    } else if base.is_empty() {
        relative.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, relative)
    } else {
        format!("{}/{}", base, relative)
    }
}

/// Directory part of a remote path, like POSIX `dirname`
pub fn remote_parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => trimmed[..index].to_string(),
        None if path.starts_with('/') => "/".to_string(),
        None => ".".to_string(),
    }
}

/// Every successive prefix of a remote path.
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`; the relative `a/b` yields `a`, `a/b`.
pub fn remote_ancestors(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut prefixes = Vec::new();

    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }

    prefixes
}

/// Part of `path` below `root`, without a leading `/`.
///
/// A path outside `root` is returned without its leading `/`.
pub fn remote_relative<'a>(root: &str, path: &'a str) -> &'a str {
    let root = root.trim_end_matches('/');
    let rest = if root.is_empty() {
        Some(path)
    } else if path == root {
        Some("")
    } else {
        path.strip_prefix(root).filter(|rest| rest.starts_with('/'))
    };

    rest.unwrap_or(path).trim_start_matches('/')
}

/// Number of `/`-separated segments, used to order directory operations
pub fn remote_depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Suffix of the sibling files downloads are written to before renaming
pub const PARTIAL_SUFFIX: &str = ".ftpsync-part";

/// Whether `path` is an in-flight download; such files are never mirrored
pub fn is_partial_download(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(PARTIAL_SUFFIX))
}
