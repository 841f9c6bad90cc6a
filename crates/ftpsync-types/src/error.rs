//! Error types and handling for ftpsync
//!
//! Every fallible operation in the workspace returns [`Error`]. The variants are
//! split along the line the sync engine cares about: local filesystem problems
//! (isolated per path), negative server replies (sometimes tolerated), and
//! everything else (propagated to the caller).

use std::path::PathBuf;

/// Main error type for ftpsync operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Local I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Local file not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Local permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Transport-level failure talking to the remote endpoint
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// The remote server answered with a negative reply
    #[error("Remote rejected request ({code}): {message}")]
    Remote {
        /// Numeric reply code sent by the server
        code: u16,
        /// Reply text sent by the server
        message: String,
    },

    /// The remote server sent something that does not follow the protocol
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message describing the malformed exchange
        message: String,
    },

    /// The persisted hash ledger could not be read or written
    #[error("Ledger error: {message}")]
    Ledger {
        /// Error message describing the ledger issue
        message: String,
    },

    /// Synchronization error
    #[error("Synchronization error: {message}")]
    Sync {
        /// Error message describing the synchronization issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local filesystem errors
    Io,
    /// Configuration errors
    Config,
    /// Transport errors
    Network,
    /// Negative server replies
    Remote,
    /// Malformed protocol exchanges
    Protocol,
    /// Ledger serialization errors
    Ledger,
    /// Synchronization errors
    Sync,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::Config { .. } => ErrorKind::Config,
            Self::Network { .. } => ErrorKind::Network,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Ledger { .. } => ErrorKind::Ledger,
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether the failure happened on the local filesystem.
    ///
    /// Local failures concern a single path and never invalidate the remote
    /// session, so callers may skip the path and keep going.
    pub fn is_local(&self) -> bool {
        self.kind() == ErrorKind::Io
    }

    /// Whether the server refused the request while keeping the session usable.
    ///
    /// `421` means the server is closing the control connection, which is a
    /// transport failure rather than a refusal.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Remote { code, .. } if (400..600).contains(code) && *code != 421)
    }

    /// Build a local I/O error that names the path involved
    pub fn local_io(path: &std::path::Path, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                message: format!("{}: {}", path.display(), error),
            },
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new negative-reply error
    pub fn remote<S: Into<String>>(code: u16, message: S) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new ledger error
    pub fn ledger<S: Into<String>>(message: S) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create a new sync error
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
