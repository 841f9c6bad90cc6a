//! Two-way directory synchronization against a remote file server
//!
//! This crate mirrors a local directory onto a remote one and keeps them
//! in sync:
//!
//! - **Initial reconciliation**: both trees are scanned, missing directories are created on
//!   either side, remote-only files are downloaded and local-only files are uploaded
//! - **Digest ledger**: a JSON object stored next to the mirrored files records the last
//!   uploaded digest of every file, so unchanged content is never re-sent
//! - **Incremental sync**: filesystem notifications are coalesced per path and applied once
//!   they have been quiet long enough
//! - **Directory cache**: remote directories known to exist are remembered to avoid
//!   redundant `MKD` round-trips
//!
//! # Examples
//!
//! ```rust,no_run
//! use ftpsync_config::SyncConfig;
//! use ftpsync_remote::MemoryRemote;
//! use ftpsync_sync::{PathMapper, SyncEngine};
//!
//! # async fn example() -> ftpsync_types::Result<()> {
//! let mapper = PathMapper::new("/home/me/notes", "/backup/notes");
//! let mut engine = SyncEngine::new(MemoryRemote::new(), mapper, &SyncConfig::default());
//! let report = engine.start().await?;
//! println!("{}", report.stats);
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod debounce;
pub mod digest;
pub mod dircache;
pub mod engine;
pub mod incremental;
pub mod ledger;
pub mod path;
pub mod plan;
pub mod scan;
pub mod watch;

pub use debounce::{EventDebouncer, PendingEvent};
pub use digest::Digester;
pub use dircache::DirectoryCache;
pub use engine::{SyncEngine, SyncReport};
pub use incremental::{IncrementalSync, TickReport};
pub use ledger::HashLedger;
pub use path::PathMapper;
pub use plan::{DirectoryPlan, ReconcilePlan};
pub use scan::{scan_local, scan_remote, LocalTree, RemoteTree};
pub use watch::FsWatcher;
