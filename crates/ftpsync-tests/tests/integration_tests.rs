//! Integration tests for ftpsync
//!
//! These tests drive the engine, the sync loop and the watcher against an
//! in-memory remote and check what reaches the server.

use ftpsync_config::SyncConfig;
use ftpsync_remote::RemoteOp;
use ftpsync_sync::{EventDebouncer, FsWatcher, IncrementalSync};
use ftpsync_tests::test_utils::{
    generate_test_data, md5_hex, SyncFixture, TestDataPattern, LEDGER_PATH,
};
use ftpsync_types::{EntryKind, EventKind, SyncStats};
use proptest::prelude::*;
use std::fs;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(100);
const SETTLE: Duration = Duration::from_millis(500);

fn store(relative: &str) -> RemoteOp {
    RemoteOp::Store(SyncFixture::remote_path(relative))
}

fn delete(relative: &str) -> RemoteOp {
    RemoteOp::Delete(SyncFixture::remote_path(relative))
}

#[tokio::test]
async fn test_new_local_file_is_uploaded_with_one_entry_ledger() {
    let fixture = SyncFixture::new();
    fixture.write_local("a.txt", b"hi");

    let mut engine = fixture.engine();
    let report = engine.start().await.unwrap();

    assert_eq!(report.stats.files_uploaded, 1);
    assert_eq!(report.stats.remote_dirs_created, 0);
    assert!(report.ledger_flushed);
    assert_eq!(fixture.remote.file_paths(), vec![LEDGER_PATH, "/r/a.txt"]);
    assert_eq!(fixture.remote.file("/r/a.txt").unwrap(), b"hi");
    assert!(!fixture
        .remote
        .mutations()
        .iter()
        .any(|op| matches!(op, RemoteOp::MakeDirectory(_))));

    let ledger = fixture.remote_ledger();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger["/r/a.txt"], "49f68a5c8493ec2c0bf489821c21fc3b");
}

#[tokio::test]
async fn test_remote_only_file_is_downloaded_and_registered() {
    let fixture = SyncFixture::new();
    fixture.remote.put_file("/r/b.txt", "hello");

    let mut engine = fixture.engine();
    let report = engine.start().await.unwrap();

    assert_eq!(report.stats.files_downloaded, 1);
    assert_eq!(fs::read(fixture.local_path("b.txt")).unwrap(), b"hello");
    assert_eq!(engine.ledger().get_hash("/r/b.txt"), Some(md5_hex(b"hello").as_str()));
    assert_eq!(fixture.remote_ledger()["/r/b.txt"], md5_hex(b"hello"));
    assert_eq!(fixture.count(&store("b.txt")), 0);
}

#[tokio::test]
async fn test_interrupted_download_does_not_clobber_remote_on_restart() {
    let fixture = SyncFixture::new();
    fixture.remote.put_file("/r/b.txt", "precious remote content");
    fixture.remote.reject("/r/b.txt", 550);

    assert!(fixture.engine().start().await.is_err());
    assert!(!fixture.local_path("b.txt").exists());
    assert_eq!(fs::read_dir(fixture.local_root()).unwrap().count(), 0);

    fixture.remote.accept("/r/b.txt");
    let report = fixture.engine().start().await.unwrap();

    assert_eq!(report.stats.files_uploaded, 0);
    assert_eq!(report.stats.files_downloaded, 1);
    assert_eq!(fixture.count(&store("b.txt")), 0);
    assert_eq!(
        fixture.remote.file("/r/b.txt").unwrap(),
        b"precious remote content"
    );
}

#[tokio::test]
async fn test_changed_file_is_deleted_then_reuploaded() {
    let fixture = SyncFixture::new();
    let d1 = md5_hex(b"version 1");
    let d2 = md5_hex(b"version 2");
    assert_ne!(d1, d2);

    fixture.remote.put_file("/r/c.txt", "version 1");
    fixture.seed_ledger(&[("/r/c.txt", &d1)]);
    fixture.write_local("c.txt", b"version 2");

    let mut engine = fixture.engine();
    let report = engine.start().await.unwrap();

    assert_eq!(report.stats.files_updated, 1);
    assert_eq!(
        fixture.remote.mutations(),
        vec![
            delete("c.txt"),
            store("c.txt"),
            RemoteOp::Store(LEDGER_PATH.to_string()),
        ]
    );
    assert_eq!(fixture.remote.file("/r/c.txt").unwrap(), b"version 2");
    assert_eq!(fixture.remote_ledger()["/r/c.txt"], d2);
}

#[tokio::test]
async fn test_second_reconciliation_is_idempotent() {
    let fixture = SyncFixture::new();
    fixture.write_local("a.txt", b"local");
    fixture.write_local("docs/guide.md", b"# guide");
    fs::create_dir_all(fixture.local_path("empty")).unwrap();
    fixture.remote.put_dir("/r/remote_dir");
    fixture.remote.put_file("/r/remote_dir/b.txt", "remote");

    let mut engine = fixture.engine();
    engine.start().await.unwrap();
    fixture.remote.clear_ops();

    let second = engine.initial_sync().await.unwrap();
    assert_eq!(second.stats.remote_mutations(), 0);
    assert_eq!(second.stats.files_downloaded, 0);
    assert_eq!(second.stats.local_dirs_created, 0);
    assert_eq!(second.stats.files_unchanged, 3);
    assert!(!second.ledger_flushed);
    assert!(fixture.remote.mutations().is_empty());

    // A restarted session sees the same state
    let mut restarted = fixture.engine();
    let third = restarted.start().await.unwrap();
    assert_eq!(third.stats.remote_mutations(), 0);
    assert_eq!(third.stats.files_downloaded, 0);
    assert!(fixture.remote.mutations().is_empty());
}

#[tokio::test]
async fn test_reconciliation_creates_directories_on_both_sides() {
    let fixture = SyncFixture::new();
    fixture.write_local("l1/l2/file.txt", b"deep");
    fixture.remote.put_dir("/r/x");
    fixture.remote.put_dir("/r/x/y");

    let mut engine = fixture.engine();
    let report = engine.start().await.unwrap();

    assert_eq!(report.stats.remote_dirs_created, 2);
    assert_eq!(report.stats.local_dirs_created, 2);
    assert_eq!(
        fixture.remote.dir_paths(),
        vec!["/", "/r", "/r/l1", "/r/l1/l2", "/r/x", "/r/x/y"]
    );
    assert!(fixture.local_path("x/y").is_dir());

    let mkdir_l2 = fixture
        .position(&RemoteOp::MakeDirectory("/r/l1/l2".to_string()))
        .unwrap();
    assert!(mkdir_l2 < fixture.position(&store("l1/l2/file.txt")).unwrap());
}

#[tokio::test]
async fn test_multi_chunk_file_round_trips() {
    let fixture = SyncFixture::new();
    let data = generate_test_data(100_000, TestDataPattern::Realistic);
    fixture.remote.put_file("/r/big.bin", data.clone());

    let mut engine = fixture.engine();
    engine.start().await.unwrap();

    assert_eq!(fs::read(fixture.local_path("big.bin")).unwrap(), data);
    assert_eq!(fixture.remote_ledger()["/r/big.bin"], md5_hex(&data));
}

#[tokio::test]
async fn test_blake3_ledger() {
    let fixture = SyncFixture::new();
    fixture.write_local("a.txt", b"hi");

    let config = SyncConfig {
        digest: ftpsync_types::DigestAlgorithm::Blake3,
        ..SyncConfig::default()
    };
    let mut engine = fixture.engine_with(&config);
    engine.start().await.unwrap();

    let expected = blake3::hash(b"hi").to_hex().to_string();
    assert_eq!(fixture.remote_ledger()["/r/a.txt"], expected);
}

#[tokio::test]
async fn test_rapid_modifications_collapse_into_one_upload() {
    let fixture = SyncFixture::new();
    let mut engine = fixture.engine();
    engine.start().await.unwrap();
    fixture.remote.clear_ops();

    let path = fixture.write_local("busy.txt", b"final");
    let debouncer = EventDebouncer::new();
    let mut sync = IncrementalSync::new(POLL, SETTLE);
    let t0 = Instant::now();

    for i in 0..10u32 {
        let at = t0 + Duration::from_millis(u64::from(i) * 20);
        debouncer.record_at(&path, EventKind::Modified, EntryKind::File, at);
        let report = sync.tick(&mut engine, debouncer.drain_and_clear(), at).await.unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.settling, 1);
    }

    let later = t0 + Duration::from_millis(180) + SETTLE + Duration::from_millis(1);
    let report = sync.tick(&mut engine, debouncer.drain_and_clear(), later).await.unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.stats.files_uploaded, 1);
    assert_eq!(fixture.count(&store("busy.txt")), 1);
    assert_eq!(fixture.remote.file("/r/busy.txt").unwrap(), b"final");
}

#[tokio::test]
async fn test_directory_is_created_before_its_file() {
    let fixture = SyncFixture::new();
    let mut engine = fixture.engine();
    engine.start().await.unwrap();
    fixture.remote.clear_ops();

    let dir = fixture.local_path("n");
    let file = fixture.write_local("n/f.txt", b"inside");
    let debouncer = EventDebouncer::new();
    let t0 = Instant::now();
    debouncer.record_at(&file, EventKind::Created, EntryKind::File, t0);
    debouncer.record_at(&dir, EventKind::Created, EntryKind::Directory, t0);

    let mut sync = IncrementalSync::new(POLL, SETTLE);
    let report = sync
        .tick(&mut engine, debouncer.drain_and_clear(), t0 + Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(report.applied, 2);
    let mkdir = fixture
        .position(&RemoteOp::MakeDirectory("/r/n".to_string()))
        .unwrap();
    let upload = fixture.position(&store("n/f.txt")).unwrap();
    assert!(mkdir < upload);
    assert_eq!(fixture.count(&store("n/f.txt")), 1);
}

#[tokio::test]
async fn test_settled_delete_flushes_ledger_once() {
    let fixture = SyncFixture::new();
    let gone = fixture.write_local("a.txt", b"a");
    let edited = fixture.write_local("b.txt", b"b");

    let mut engine = fixture.engine();
    engine.start().await.unwrap();
    fixture.remote.clear_ops();

    fs::remove_file(&gone).unwrap();
    fs::write(&edited, b"b, edited").unwrap();

    let debouncer = EventDebouncer::new();
    let t0 = Instant::now();
    debouncer.record_at(&gone, EventKind::Deleted, EntryKind::File, t0);
    debouncer.record_at(&edited, EventKind::Modified, EntryKind::File, t0);

    let mut sync = IncrementalSync::new(POLL, SETTLE);
    let report = sync
        .tick(&mut engine, debouncer.drain_and_clear(), t0 + Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.files_updated, 1);
    assert!(report.ledger_flushed);
    assert!(fixture.remote.file("/r/a.txt").is_none());
    assert_eq!(fixture.count(&RemoteOp::Store(LEDGER_PATH.to_string())), 1);

    let ledger = fixture.remote_ledger();
    assert!(!ledger.contains_key("/r/a.txt"));
    assert_eq!(ledger["/r/b.txt"], md5_hex(b"b, edited"));
}

#[tokio::test]
async fn test_deleted_directory_removes_remote_subtree() {
    let fixture = SyncFixture::new();
    fixture.write_local("d1/d2/deep.txt", b"deep");
    fixture.write_local("d1/top.txt", b"top");

    let mut engine = fixture.engine();
    engine.start().await.unwrap();
    fixture.remote.clear_ops();

    let d1 = fixture.local_path("d1");
    fs::remove_dir_all(&d1).unwrap();

    let debouncer = EventDebouncer::new();
    let t0 = Instant::now();
    debouncer.record_at(&d1, EventKind::Deleted, EntryKind::Directory, t0);
    debouncer.record_at(
        fixture.local_path("d1/top.txt"),
        EventKind::Deleted,
        EntryKind::File,
        t0,
    );

    let mut sync = IncrementalSync::new(POLL, SETTLE);
    let report = sync
        .tick(&mut engine, debouncer.drain_and_clear(), t0 + Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(report.stats.files_deleted, 2);
    assert_eq!(report.stats.dirs_deleted, 2);
    assert!(!fixture.remote.has_dir("/r/d1"));
    assert!(!fixture.remote.has_dir("/r/d1/d2"));
    assert!(fixture.remote_ledger().is_empty());
    assert!(!engine.directories().contains("/r/d1"));
}

#[tokio::test]
async fn test_watcher_feeds_running_loop() {
    let fixture = SyncFixture::new();
    let root = fixture.local_root().canonicalize().unwrap();
    let mut engine = ftpsync_sync::SyncEngine::new(
        fixture.remote.clone(),
        ftpsync_sync::PathMapper::new(root.clone(), "/r"),
        &SyncConfig::default(),
    );
    engine.start().await.unwrap();

    let debouncer = EventDebouncer::new();
    let _watcher = FsWatcher::start(&root, debouncer.clone()).unwrap();
    fs::write(root.join("live.txt"), b"watched").unwrap();

    let shutdown = CancellationToken::new();
    let mut sync = IncrementalSync::new(Duration::from_millis(20), Duration::from_millis(100));
    let remote = fixture.remote.clone();
    let stopper = shutdown.clone();

    let (stats, ()) = timeout(Duration::from_secs(10), async {
        tokio::join!(sync.run(&mut engine, &debouncer, shutdown), async move {
            while remote.file("/r/live.txt").is_none() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            stopper.cancel();
        })
    })
    .await
    .expect("live.txt never reached the remote");

    let stats: SyncStats = stats.unwrap();
    assert!(stats.files_uploaded >= 1);
    assert_eq!(fixture.remote.file("/r/live.txt").unwrap(), b"watched");

    engine.shutdown().await.unwrap();
    assert_eq!(fixture.remote_ledger()["/r/live.txt"], md5_hex(b"watched"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_unmodified_file_is_never_reuploaded(
        content in prop::collection::vec(any::<u8>(), 0..4096),
        checks in 1usize..5,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let fixture = SyncFixture::new();
            let path = fixture.write_local("f.bin", &content);
            let mut engine = fixture.engine();
            engine.start().await.unwrap();
            fixture.remote.clear_ops();

            let mut stats = SyncStats::new();
            for _ in 0..checks {
                let uploaded = engine.upload_if_changed(&path, &mut stats).await.unwrap();
                prop_assert!(!uploaded);
            }
            prop_assert_eq!(stats.files_unchanged, checks as u64);
            prop_assert!(fixture.remote.mutations().is_empty());
            Ok(())
        })?;
    }
}
