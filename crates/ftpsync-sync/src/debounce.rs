//! Coalescing of raw filesystem notifications

use ftpsync_types::{EntryKind, EventKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Latest observed change for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    /// What happened
    pub kind: EventKind,
    /// When it was observed
    pub at: Instant,
    /// Whether the path is a file or a directory
    pub entry: EntryKind,
}

impl PendingEvent {
    /// Create an event
    pub fn new(kind: EventKind, at: Instant, entry: EntryKind) -> Self {
        Self { kind, at, entry }
    }
}

/// Table of pending events shared between the watcher thread and the sync loop.
///
/// Only the latest event per path is kept. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct EventDebouncer {
    table: Arc<Mutex<HashMap<PathBuf, PendingEvent>>>,
}

impl EventDebouncer {
    /// Create an empty debouncer
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, PendingEvent>> {
        // The table holds plain values; a panic elsewhere cannot leave it half-written
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an event observed now
    pub fn record<P: Into<PathBuf>>(&self, path: P, kind: EventKind, entry: EntryKind) {
        self.record_at(path, kind, entry, Instant::now());
    }

    /// Record an event observed at `at`, replacing any earlier event for the path
    pub fn record_at<P: Into<PathBuf>>(
        &self,
        path: P,
        kind: EventKind,
        entry: EntryKind,
        at: Instant,
    ) {
        self.lock()
            .insert(path.into(), PendingEvent::new(kind, at, entry));
    }

    /// Record a move as a deletion of `from` and a creation of `to`
    pub fn record_rename<P: Into<PathBuf>, Q: Into<PathBuf>>(
        &self,
        from: P,
        to: Q,
        entry: EntryKind,
    ) {
        let at = Instant::now();
        let mut table = self.lock();
        table.insert(from.into(), PendingEvent::new(EventKind::Deleted, at, entry));
        table.insert(to.into(), PendingEvent::new(EventKind::Created, at, entry));
    }

    /// Take every pending event, leaving the table empty
    pub fn drain_and_clear(&self) -> HashMap<PathBuf, PendingEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of paths with a pending event
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no event is pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_latest_event_wins() {
        let debouncer = EventDebouncer::new();
        let start = Instant::now();
        debouncer.record_at("/w/a.txt", EventKind::Created, EntryKind::File, start);
        debouncer.record_at(
            "/w/a.txt",
            EventKind::Modified,
            EntryKind::File,
            start + Duration::from_millis(10),
        );
        debouncer.record_at(
            "/w/a.txt",
            EventKind::Modified,
            EntryKind::File,
            start + Duration::from_millis(20),
        );

        let drained = debouncer.drain_and_clear();
        assert_eq!(drained.len(), 1);
        let event = drained[Path::new("/w/a.txt")];
        assert_eq!(event.kind, EventKind::Modified);
        assert_eq!(event.at, start + Duration::from_millis(20));
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_rename_records_both_sides() {
        let debouncer = EventDebouncer::new();
        debouncer.record_rename("/w/old", "/w/new", EntryKind::Directory);

        let drained = debouncer.drain_and_clear();
        assert_eq!(drained[Path::new("/w/old")].kind, EventKind::Deleted);
        assert_eq!(drained[Path::new("/w/new")].kind, EventKind::Created);
        assert_eq!(drained[Path::new("/w/new")].entry, EntryKind::Directory);
        assert_eq!(drained[Path::new("/w/old")].at, drained[Path::new("/w/new")].at);
    }

    #[test]
    fn test_clones_share_table_across_threads() {
        let debouncer = EventDebouncer::new();
        let producer = debouncer.clone();

        std::thread::spawn(move || {
            for i in 0..50 {
                producer.record(format!("/w/{}", i % 5), EventKind::Modified, EntryKind::File);
            }
        })
        .join()
        .unwrap();

        assert_eq!(debouncer.len(), 5);
        assert_eq!(debouncer.drain_and_clear().len(), 5);
        assert_eq!(debouncer.len(), 0);
    }
}
