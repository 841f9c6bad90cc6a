//! Remote file-transfer clients for ftpsync
//!
//! This crate provides the session abstraction the sync engine drives and
//! two implementations of it:
//!
//! - **[`FtpClient`]**: FTP over tokio sockets, binary mode, EPSV with PASV fallback,
//!   `MLSD` listings
//! - **[`MemoryRemote`]**: an in-memory server that records every operation, used by
//!   tests and for dry runs
//!
//! # Examples
//!
//! ```rust
//! use ftpsync_remote::{MemoryRemote, RemoteClient};
//!
//! # async fn example() -> ftpsync_types::Result<()> {
//! let mut remote = MemoryRemote::new();
//! remote.connect().await?;
//! remote.login().await?;
//! remote.make_directory("/backup").await?;
//!
//! let mut contents: &[u8] = b"hello";
//! remote.store("/backup/hello.txt", &mut contents).await?;
//! assert_eq!(remote.list_directory("/backup").await?.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod connection;
pub mod ftp;
pub mod memory;
pub mod protocol;

pub use client::{RemoteClient, RemoteEntry};
pub use connection::ControlConnection;
pub use ftp::FtpClient;
pub use memory::{MemoryRemote, RemoteOp};
pub use protocol::Reply;
