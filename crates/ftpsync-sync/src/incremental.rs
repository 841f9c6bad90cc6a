//! Event-driven incremental sync loop
//!
//! Every tick drains the debouncer, waits for file events to settle, and
//! applies the settled ones in an order that keeps the remote tree valid:
//! directory creations (shallowest first), then file operations, then
//! directory deletions (deepest first). The ledger is flushed at most once
//! per tick.

use crate::debounce::{EventDebouncer, PendingEvent};
use crate::engine::{isolate_local, SyncEngine};
use ftpsync_config::SyncConfig;
use ftpsync_remote::RemoteClient;
use ftpsync_types::{EntryKind, EventKind, Result, SyncStats};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of one loop iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// What the applied events did
    pub stats: SyncStats,
    /// Events applied this tick
    pub applied: usize,
    /// File events still waiting to settle
    pub settling: usize,
    /// Whether the ledger object was rewritten
    pub ledger_flushed: bool,
}

/// Pending-event state of the incremental loop
#[derive(Debug, Clone)]
pub struct IncrementalSync {
    pending: HashMap<PathBuf, PendingEvent>,
    settle_threshold: Duration,
    poll_interval: Duration,
}

impl IncrementalSync {
    /// Create a loop with explicit timings
    pub fn new(poll_interval: Duration, settle_threshold: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            settle_threshold,
            poll_interval,
        }
    }

    /// Create a loop with the configured timings
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.poll_interval(), config.settle_threshold())
    }

    /// Number of events waiting to settle
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn merge(&mut self, drained: HashMap<PathBuf, PendingEvent>) {
        for (path, event) in drained {
            match self.pending.get(&path) {
                Some(existing) if existing.at > event.at => {}
                _ => {
                    self.pending.insert(path, event);
                }
            }
        }
    }

    /// Remove settled events from the pending table, in application order
    fn take_settled(&mut self, now: Instant) -> Vec<(PathBuf, PendingEvent)> {
        let threshold = self.settle_threshold;
        let settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, event)| {
                event.entry.is_dir() || now.saturating_duration_since(event.at) > threshold
            })
            .map(|(path, _)| path.clone())
            .collect();

        let mut batch: Vec<(PathBuf, PendingEvent)> = settled
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|event| (path, event)))
            .collect();
        batch.sort_by_key(|(path, event)| apply_order(path, event));
        batch
    }

    /// Run one iteration with the events drained from the debouncer
    pub async fn tick<C: RemoteClient>(
        &mut self,
        engine: &mut SyncEngine<C>,
        drained: HashMap<PathBuf, PendingEvent>,
        now: Instant,
    ) -> Result<TickReport> {
        self.merge(drained);
        let batch = self.take_settled(now);

        let mut report = TickReport {
            applied: batch.len(),
            settling: self.pending.len(),
            ..TickReport::default()
        };

        for (path, event) in &batch {
            let result = apply_event(engine, path, event, &mut report.stats).await;
            isolate_local(result, path, &mut report.stats)?;
        }

        report.ledger_flushed = engine.flush_ledger().await?;
        if report.stats.has_changes() || report.stats.failed > 0 {
            info!("Applied {} events: {}", report.applied, report.stats);
        }
        Ok(report)
    }

    /// Poll `debouncer` until `shutdown` is cancelled, returning the
    /// accumulated statistics.
    ///
    /// A tick in progress when cancellation arrives runs to completion.
    pub async fn run<C: RemoteClient>(
        &mut self,
        engine: &mut SyncEngine<C>,
        debouncer: &EventDebouncer,
        shutdown: CancellationToken,
    ) -> Result<SyncStats> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut totals = SyncStats::new();

        info!(
            "Watching for changes (poll {:?}, settle {:?})",
            self.poll_interval, self.settle_threshold
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let drained = debouncer.drain_and_clear();
                    let report = self.tick(engine, drained, Instant::now()).await?;
                    totals.merge(&report.stats);
                }
            }
        }

        debug!("Sync loop stopped with {} events unapplied", self.pending.len());
        Ok(totals)
    }
}

/// Sort key: directory creations by depth, file operations, directory
/// deletions by reverse depth
fn apply_order(path: &Path, event: &PendingEvent) -> (u8, i64, PathBuf) {
    let depth = path.components().count() as i64;
    match (event.entry, event.kind) {
        (EntryKind::Directory, EventKind::Created) => (0, depth, path.to_path_buf()),
        (EntryKind::Directory, EventKind::Deleted) => (2, -depth, path.to_path_buf()),
        _ => (1, 0, path.to_path_buf()),
    }
}

async fn apply_event<C: RemoteClient>(
    engine: &mut SyncEngine<C>,
    path: &Path,
    event: &PendingEvent,
    stats: &mut SyncStats,
) -> Result<()> {
    debug!("Applying {} {} {}", event.entry, event.kind, path.display());
    match (event.entry, event.kind) {
        (EntryKind::Directory, EventKind::Created) => engine.create_directory(path, stats).await,
        (EntryKind::Directory, EventKind::Deleted) => engine.delete_directory(path, stats).await,
        (EntryKind::Directory, EventKind::Modified) => Ok(()),
        (EntryKind::File, EventKind::Deleted) => engine.delete_file(path, stats).await,
        (EntryKind::File, EventKind::Created | EventKind::Modified) => {
            engine.upload_if_changed(path, stats).await.map(|_| ())
        }
    }
}
