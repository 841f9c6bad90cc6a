//! Main synchronization engine

use crate::{
    digest::Digester,
    dircache::DirectoryCache,
    ledger::HashLedger,
    path::{remote_join, remote_parent, PathMapper, PARTIAL_SUFFIX},
    plan::{DirectoryPlan, ReconcilePlan},
    scan::{scan_local, scan_remote},
};
use ftpsync_config::SyncConfig;
use ftpsync_remote::RemoteClient;
use ftpsync_types::{Error, Result, SyncStats};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Outcome of a full reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// What the pass did
    pub stats: SyncStats,
    /// Whether the ledger object was rewritten
    pub ledger_flushed: bool,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

/// Skip a path whose failure is local, count it, and keep going
pub(crate) fn isolate_local(result: Result<()>, path: &Path, stats: &mut SyncStats) -> Result<()> {
    match result {
        Err(e) if e.is_local() => {
            warn!("Skipping {}: {}", path.display(), e);
            stats.failed += 1;
            Ok(())
        }
        other => other,
    }
}

/// Two-way synchronization engine.
///
/// Owns the remote session, the hash ledger and the directory cache. Every
/// method takes `&mut self`: one task drives the engine at a time.
#[derive(Debug)]
pub struct SyncEngine<C: RemoteClient> {
    client: C,
    mapper: PathMapper,
    ledger: HashLedger,
    dirs: DirectoryCache,
    digester: Digester,
    ledger_name: String,
    delete_before_store: bool,
}

impl<C: RemoteClient> SyncEngine<C> {
    /// Create an engine mirroring `mapper`'s roots through `client`
    pub fn new(client: C, mapper: PathMapper, config: &SyncConfig) -> Self {
        let ledger = HashLedger::new(remote_join(mapper.remote_root(), &config.ledger_name));
        Self {
            client,
            mapper,
            ledger,
            dirs: DirectoryCache::new(),
            digester: Digester::new(config.digest, config.chunk_size),
            ledger_name: config.ledger_name.clone(),
            delete_before_store: config.delete_before_store,
        }
    }

    /// Remote session
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Path translation between the two roots
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Hash ledger
    pub fn ledger(&self) -> &HashLedger {
        &self.ledger
    }

    /// Remote directories known to exist
    pub fn directories(&self) -> &DirectoryCache {
        &self.dirs
    }

    fn is_ledger(&self, remote_path: &str) -> bool {
        remote_path == self.ledger.remote_path()
    }

    /// Connect, log in and run the initial reconciliation
    pub async fn start(&mut self) -> Result<SyncReport> {
        info!("Logging in..");
        let welcome = self.client.connect().await?;
        info!("{}", welcome);
        let reply = self.client.login().await?;
        info!("{}", reply);

        self.dirs.seed_ancestors(self.mapper.remote_root());

        info!("Syncing up files...");
        let report = self.initial_sync().await?;
        info!("Synced: {}", report.stats);
        Ok(report)
    }

    /// Flush the ledger and end the remote session
    pub async fn shutdown(&mut self) -> Result<()> {
        self.flush_ledger().await?;
        let farewell = self.client.quit().await?;
        if !farewell.is_empty() {
            info!("{}", farewell);
        }
        Ok(())
    }

    /// Write the ledger object if it changed since the last flush
    pub async fn flush_ledger(&mut self) -> Result<bool> {
        self.ledger.flush(&mut self.client).await
    }

    /// Bring both trees into agreement.
    ///
    /// Directories missing on either side are created, the ledger is loaded,
    /// files present on both sides are re-uploaded when their digest changed,
    /// and files present on one side only are copied across. The ledger is
    /// flushed once at the end.
    pub async fn initial_sync(&mut self) -> Result<SyncReport> {
        let started = Instant::now();
        let mut stats = SyncStats::new();
        let remote_root = self.mapper.remote_root().to_string();

        let remote = scan_remote(&mut self.client, &remote_root, true).await?;
        let local = scan_local(self.mapper.local_root())?;

        if remote.root_found {
            self.dirs.insert(remote_root.clone());
        } else {
            stats.remote_dirs_created +=
                self.dirs.ensure_directory(&mut self.client, &remote_root).await? as u64;
        }
        for dir in &remote.dirs {
            self.dirs.insert(dir.clone());
        }

        let dir_plan = DirectoryPlan::compute(&self.mapper, &local.dirs, &remote.dirs);
        for remote_dir in &dir_plan.create_remote {
            stats.remote_dirs_created +=
                self.dirs.ensure_directory(&mut self.client, remote_dir).await? as u64;
        }
        for local_dir in &dir_plan.create_local {
            info!("Creating directory {}", local_dir.display());
            let created = fs::create_dir_all(local_dir)
                .await
                .map_err(|e| Error::local_io(local_dir, &e));
            if created.is_ok() {
                stats.local_dirs_created += 1;
            }
            isolate_local(created, local_dir, &mut stats)?;
        }

        if remote.files.contains(&self.ledger_name) {
            self.ledger.load(&mut self.client).await?;
        }

        let plan = ReconcilePlan::compute(&local.files, &remote.files, &self.ledger_name);
        debug!(
            "Plan: {} to check, {} to download, {} to upload",
            plan.check.len(),
            plan.download.len(),
            plan.upload.len()
        );

        for relative in &plan.check {
            let local_path = self.mapper.to_local(&remote_join(&remote_root, relative));
            let result = self.upload_if_changed(&local_path, &mut stats).await.map(|_| ());
            isolate_local(result, &local_path, &mut stats)?;
        }

        for relative in &plan.download {
            let local_path = self.mapper.to_local(&remote_join(&remote_root, relative));
            let result = self.download_and_register(&local_path, &mut stats).await;
            isolate_local(result, &local_path, &mut stats)?;
        }

        for relative in &plan.upload {
            let local_path = self.mapper.to_local(&remote_join(&remote_root, relative));
            let result = self.upload_and_register(&local_path, &mut stats).await;
            isolate_local(result, &local_path, &mut stats)?;
        }

        let ledger_flushed = self.flush_ledger().await?;

        Ok(SyncReport {
            stats,
            ledger_flushed,
            duration: started.elapsed(),
        })
    }

    async fn open_local(local: &Path) -> Result<File> {
        File::open(local).await.map_err(|e| Error::local_io(local, &e))
    }

    /// Ensure the remote parent exists, then store `file` at `remote_path`
    async fn transmit(
        &mut self,
        mut file: File,
        remote_path: &str,
        stats: &mut SyncStats,
    ) -> Result<u64> {
        stats.remote_dirs_created += self
            .dirs
            .ensure_directory(&mut self.client, &remote_parent(remote_path))
            .await? as u64;

        let sent = self.client.store(remote_path, &mut file).await?;
        stats.bytes_uploaded += sent;
        Ok(sent)
    }

    /// Upload a local file to its mapped remote path without consulting the ledger
    pub async fn upload_file(&mut self, local: &Path, stats: &mut SyncStats) -> Result<u64> {
        let remote_path = self.mapper.to_remote(local);
        let file = Self::open_local(local).await?;
        info!("Uploading {} => {}", local.display(), remote_path);
        self.transmit(file, &remote_path, stats).await
    }

    /// Download the remote counterpart of `local`, creating local parents.
    ///
    /// Content lands in a sibling partial file that replaces `local` only
    /// once the transfer completed; on failure `local` is left as it was and
    /// the partial file is removed.
    pub async fn download_file(&mut self, local: &Path, stats: &mut SyncStats) -> Result<u64> {
        let remote_path = self.mapper.to_remote(local);
        info!("Downloading {} => {}", remote_path, local.display());

        let parent = local.parent().ok_or_else(|| Error::Io {
            message: format!("No parent directory for {}", local.display()),
        })?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::local_io(parent, &e))?;

        let partial = tempfile::Builder::new()
            .prefix(".")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| Error::local_io(parent, &e))?;
        let (partial_file, partial_path) = partial.into_parts();
        let mut file = File::from_std(partial_file);

        let received = self.client.retrieve(&remote_path, &mut file).await?;
        file.flush()
            .await
            .map_err(|e| Error::local_io(&partial_path, &e))?;
        drop(file);

        partial_path
            .persist(local)
            .map_err(|e| Error::local_io(local, &e.error))?;

        stats.bytes_downloaded += received;
        Ok(received)
    }

    async fn download_and_register(&mut self, local: &Path, stats: &mut SyncStats) -> Result<()> {
        self.download_file(local, stats).await?;
        let digest = self.digester.digest_file(local).await?;
        self.ledger.register_hash(self.mapper.to_remote(local), digest);
        stats.files_downloaded += 1;
        Ok(())
    }

    async fn upload_and_register(&mut self, local: &Path, stats: &mut SyncStats) -> Result<()> {
        let digest = self.digester.digest_file(local).await?;
        self.upload_file(local, stats).await?;
        self.ledger.register_hash(self.mapper.to_remote(local), digest);
        stats.files_uploaded += 1;
        Ok(())
    }

    /// Upload `local` when its digest differs from the ledger, returning
    /// whether a transfer happened.
    ///
    /// The digest is computed before any remote mutation; a local failure
    /// leaves the remote side and the ledger untouched.
    pub async fn upload_if_changed(&mut self, local: &Path, stats: &mut SyncStats) -> Result<bool> {
        let remote_path = self.mapper.to_remote(local);
        if self.is_ledger(&remote_path) {
            debug!("Ignoring local copy of the ledger: {}", local.display());
            return Ok(false);
        }

        let digest = self.digester.digest_file(local).await?;
        let recorded = self.ledger.get_hash(&remote_path).map(str::to_string);
        if recorded.as_deref() == Some(digest.as_str()) {
            debug!("Unchanged: {}", remote_path);
            stats.files_unchanged += 1;
            return Ok(false);
        }

        let file = Self::open_local(local).await?;
        if recorded.is_some() {
            info!("Updating {}", remote_path);
            if self.delete_before_store {
                match self.client.delete(&remote_path).await {
                    Ok(()) => {}
                    Err(e) if e.is_rejection() => {
                        debug!("Stale copy of {} already gone: {}", remote_path, e);
                    }
                    Err(e) => return Err(e),
                }
            }
            self.transmit(file, &remote_path, stats).await?;
            stats.files_updated += 1;
        } else {
            info!("Creating {}", remote_path);
            self.transmit(file, &remote_path, stats).await?;
            stats.files_uploaded += 1;
        }

        self.ledger.register_hash(remote_path, digest);
        Ok(true)
    }

    /// Create the remote counterpart of a local directory, then upload
    /// whatever it already contains
    pub async fn create_directory(&mut self, local: &Path, stats: &mut SyncStats) -> Result<()> {
        let remote_path = self.mapper.to_remote(local);
        stats.remote_dirs_created +=
            self.dirs.ensure_directory(&mut self.client, &remote_path).await? as u64;

        let contents = scan_local(local)?;
        for dir in &contents.dirs {
            let remote_dir = self.mapper.to_remote(dir);
            stats.remote_dirs_created +=
                self.dirs.ensure_directory(&mut self.client, &remote_dir).await? as u64;
        }
        for relative in &contents.files {
            let path = local.join(relative);
            let result = self.upload_if_changed(&path, stats).await.map(|_| ());
            isolate_local(result, &path, stats)?;
        }
        Ok(())
    }

    /// Delete the remote counterpart of a local file and forget its digest.
    ///
    /// Files the ledger never recorded were never uploaded and are skipped.
    /// A path the cache knows as a directory is deleted as one, since a
    /// vanished path no longer tells which kind it was.
    pub async fn delete_file(&mut self, local: &Path, stats: &mut SyncStats) -> Result<()> {
        let remote_path = self.mapper.to_remote(local);
        if self.is_ledger(&remote_path) {
            return Ok(());
        }

        if !self.ledger.contains(&remote_path) {
            if self.dirs.contains(&remote_path) {
                return self.delete_directory(local, stats).await;
            }
            debug!("{} was never uploaded, nothing to delete", remote_path);
            return Ok(());
        }

        info!("Deleting file {}", remote_path);
        self.client.delete(&remote_path).await?;
        self.ledger.unregister_hash(&remote_path);
        stats.files_deleted += 1;
        Ok(())
    }

    /// Delete the remote counterpart of a local directory with everything
    /// the engine tracks below it.
    ///
    /// Negative replies are logged and ignored: the server may already have
    /// lost the directory.
    pub async fn delete_directory(&mut self, local: &Path, stats: &mut SyncStats) -> Result<()> {
        let remote_path = self.mapper.to_remote(local);
        if remote_path == self.mapper.remote_root() {
            warn!("Refusing to delete the remote root {}", remote_path);
            return Ok(());
        }
        info!("Deleting directory {}", remote_path);

        for file in self.ledger.tracked_under(&remote_path) {
            match self.client.delete(&file).await {
                Ok(()) => stats.files_deleted += 1,
                Err(e) if e.is_rejection() => debug!("{} already gone: {}", file, e),
                Err(e) => return Err(e),
            }
            self.ledger.unregister_hash(&file);
        }

        let mut doomed = self.dirs.subdirectories(&remote_path);
        doomed.push(remote_path.clone());
        for dir in doomed {
            match self.client.remove_directory(&dir).await {
                Ok(()) => stats.dirs_deleted += 1,
                Err(e) if e.is_rejection() => warn!("Could not remove directory {}: {}", dir, e),
                Err(e) => return Err(e),
            }
        }

        self.dirs.remove_tree(&remote_path);
        Ok(())
    }
}
