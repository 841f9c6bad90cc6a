//! In-memory remote used by tests and dry runs

use crate::client::{RemoteClient, RemoteEntry};
use async_trait::async_trait;
use ftpsync_types::{EntryKind, Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One operation performed against a [`MemoryRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// Directory listing
    List(String),
    /// File download
    Retrieve(String),
    /// File upload
    Store(String),
    /// File deletion
    Delete(String),
    /// Directory creation
    MakeDirectory(String),
    /// Directory removal
    RemoveDirectory(String),
}

impl RemoteOp {
    /// Path the operation targeted
    pub fn path(&self) -> &str {
        match self {
            Self::List(p)
            | Self::Retrieve(p)
            | Self::Store(p)
            | Self::Delete(p)
            | Self::MakeDirectory(p)
            | Self::RemoveDirectory(p) => p,
        }
    }

    /// Whether the operation changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Retrieve(_))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    ops: Vec<RemoteOp>,
    rejections: HashMap<String, u16>,
}

impl MemoryState {
    fn check_rejection(&self, path: &str) -> Result<()> {
        match self.rejections.get(path) {
            Some(code) => Err(Error::remote(*code, format!("{}: rejected", path))),
            None => Ok(()),
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.directories.contains(path)
    }

    fn exists(&self, path: &str) -> bool {
        self.is_dir(path) || self.files.contains_key(path)
    }

    fn add_directory_chain(&mut self, path: &str) {
        let mut current = String::new();
        for piece in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(piece);
            self.directories.insert(current.clone());
        }
    }
}

/// Remote endpoint held entirely in memory.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another. Paths are absolute, `/`-separated, with the root `/` always
/// present. Failures mimic an FTP server: refused operations return
/// permanent (`550`/`553`) replies.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryRemote {
    /// Create an empty remote containing only `/`
    pub fn new() -> Self {
        let remote = Self::default();
        remote.lock().directories.insert("/".to_string());
        remote
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a directory and all of its ancestors
    pub fn put_dir(&self, path: &str) {
        self.lock().add_directory_chain(&normalize(path));
    }

    /// Create or replace a file, creating its ancestors
    pub fn put_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let path = normalize(path);
        let mut state = self.lock();
        state.add_directory_chain(parent_of(&path));
        state.files.insert(path, contents.into());
    }

    /// Contents of the file at `path`
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize(path)).cloned()
    }

    /// Whether `path` is a directory
    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().is_dir(&normalize(path))
    }

    /// All file paths, sorted
    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// All directory paths, sorted
    pub fn dir_paths(&self) -> Vec<String> {
        self.lock().directories.iter().cloned().collect()
    }

    /// Every operation performed so far, in order
    pub fn ops(&self) -> Vec<RemoteOp> {
        self.lock().ops.clone()
    }

    /// Operations that changed remote state, in order
    pub fn mutations(&self) -> Vec<RemoteOp> {
        self.lock()
            .ops
            .iter()
            .filter(|op| op.is_mutation())
            .cloned()
            .collect()
    }

    /// Forget the recorded operations
    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Make every operation on `path` fail with reply `code`
    pub fn reject(&self, path: &str, code: u16) {
        self.lock().rejections.insert(normalize(path), code);
    }

    /// Stop rejecting operations on `path`
    pub fn accept(&self, path: &str) {
        self.lock().rejections.remove(&normalize(path));
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn connect(&mut self) -> Result<String> {
        Ok("Memory remote ready".to_string())
    }

    async fn login(&mut self) -> Result<String> {
        Ok("Logged in".to_string())
    }

    async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops.push(RemoteOp::List(path.clone()));
        state.check_rejection(&path)?;

        if !state.is_dir(&path) {
            return Err(Error::remote(550, format!("{}: No such directory", path)));
        }

        let dirs = state
            .directories
            .iter()
            .filter(|d| d.as_str() != "/" && parent_of(d) == path)
            .map(|d| RemoteEntry::dir(name_of(d)));
        let files = state
            .files
            .keys()
            .filter(|f| parent_of(f) == path)
            .map(|f| RemoteEntry {
                name: name_of(f).to_string(),
                kind: EntryKind::File,
            });
        Ok(dirs.chain(files).collect())
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let path = normalize(path);
        let contents = {
            let mut state = self.lock();
            state.ops.push(RemoteOp::Retrieve(path.clone()));
            state.check_rejection(&path)?;
            state
                .files
                .get(&path)
                .cloned()
                .ok_or_else(|| Error::remote(550, format!("{}: No such file", path)))?
        };

        sink.write_all(&contents).await?;
        sink.flush().await?;
        Ok(contents.len() as u64)
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64> {
        let path = normalize(path);
        {
            let mut state = self.lock();
            state.ops.push(RemoteOp::Store(path.clone()));
            state.check_rejection(&path)?;
            if !state.is_dir(parent_of(&path)) {
                return Err(Error::remote(553, format!("{}: Parent directory missing", path)));
            }
            if state.is_dir(&path) {
                return Err(Error::remote(550, format!("{}: Is a directory", path)));
            }
        }

        let mut contents = Vec::new();
        source.read_to_end(&mut contents).await?;
        let sent = contents.len() as u64;
        self.lock().files.insert(path, contents);
        Ok(sent)
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops.push(RemoteOp::Delete(path.clone()));
        state.check_rejection(&path)?;
        state
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| Error::remote(550, format!("{}: No such file", path)))
    }

    async fn make_directory(&mut self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops.push(RemoteOp::MakeDirectory(path.clone()));
        state.check_rejection(&path)?;

        if state.exists(&path) {
            return Err(Error::remote(550, format!("{}: File exists", path)));
        }
        if !state.is_dir(parent_of(&path)) {
            return Err(Error::remote(550, format!("{}: Parent directory missing", path)));
        }
        state.directories.insert(path);
        Ok(())
    }

    async fn remove_directory(&mut self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops.push(RemoteOp::RemoveDirectory(path.clone()));
        state.check_rejection(&path)?;

        if path == "/" || !state.is_dir(&path) {
            return Err(Error::remote(550, format!("{}: No such directory", path)));
        }
        let occupied = state
            .directories
            .iter()
            .chain(state.files.keys())
            .any(|p| p != &path && parent_of(p) == path);
        if occupied {
            return Err(Error::remote(550, format!("{}: Directory not empty", path)));
        }
        state.directories.remove(&path);
        Ok(())
    }

    async fn quit(&mut self) -> Result<String> {
        Ok("Goodbye".to_string())
    }
}
