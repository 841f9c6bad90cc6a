//! The remote client abstraction the sync engine drives

use async_trait::async_trait;
use ftpsync_types::{EntryKind, Result};
use tokio::io::{AsyncRead, AsyncWrite};

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name, without any directory component
    pub name: String,
    /// Whether the entry is a file or a directory
    pub kind: EntryKind,
}

impl RemoteEntry {
    /// Create a file entry
    pub fn file<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    /// Create a directory entry
    pub fn dir<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Session with a remote file-transfer endpoint.
///
/// A session is stateful and must be driven by a single task. Negative server
/// replies surface as [`ftpsync_types::Error::Remote`], so callers can tell
/// "the server refused this path" apart from a broken connection with
/// [`ftpsync_types::Error::is_rejection`].
#[async_trait]
pub trait RemoteClient: Send {
    /// Open the control connection, returning the server greeting
    async fn connect(&mut self) -> Result<String>;

    /// Authenticate, returning the final login reply
    async fn login(&mut self) -> Result<String>;

    /// List the files and directories directly below `path`
    async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Download `path` into `sink`, returning the number of bytes received
    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;

    /// Upload `source` to `path`, replacing any existing file, returning bytes sent
    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64>;

    /// Delete the file at `path`
    async fn delete(&mut self, path: &str) -> Result<()>;

    /// Create the directory `path`; its parent must exist
    async fn make_directory(&mut self, path: &str) -> Result<()>;

    /// Remove the empty directory `path`
    async fn remove_directory(&mut self, path: &str) -> Result<()>;

    /// End the session politely, returning the farewell reply
    async fn quit(&mut self) -> Result<String>;
}
