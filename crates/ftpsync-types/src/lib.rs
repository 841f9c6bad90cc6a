//! Core type system and error handling for ftpsync
//!
//! This crate provides the foundational types shared by every ftpsync crate:
//!
//! - **Error handling**: one error enum that separates local, remote and transport failures
//! - **Event vocabulary**: entry kinds and change kinds reported by the filesystem watcher
//! - **Statistics**: counters for reconciliation passes and sync loop ticks
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ftpsync_types::{Error, Result, SyncStats};
//!
//! fn example_operation() -> Result<SyncStats> {
//!     let mut stats = SyncStats::new();
//!     stats.files_uploaded = 2;
//!     if stats.remote_mutations() == 0 {
//!         return Err(Error::sync("nothing happened"));
//!     }
//!     Ok(stats)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use types::*;
