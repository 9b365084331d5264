//! Polling driver end to end: workspace edits reach the store.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fader_store::{BucketManager, DbManager, FileManager, RedbStore, StoreResult};
use fader_sync::{InitOutcome, PollingSource, SyncConfig, Synchronizer};
use fader_types::{DataUsed, File, ImportPolicy};

fn synchronizer(workspace: &Path) -> Synchronizer {
    let store: Arc<dyn DbManager> = Arc::new(RedbStore::in_memory().unwrap());
    let mut config = SyncConfig::with_workspace(workspace);
    config.poll_interval_ms = 25;
    config.import_policy = ImportPolicy::BestEffort;
    Synchronizer::new(store, config)
}

fn put(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn find(sync: &Synchronizer, bucket: &str, file: &str) -> StoreResult<File> {
    let bucket = sync.store().find_bucket_by_name(bucket, DataUsed::PRIMARY_IDS)?;
    sync.store()
        .find_file_by_name(&bucket.id, file, DataUsed::FULL_FILE)
}

/// Poll `check` until it holds or two seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..80 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn polling_driver_follows_the_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    put(&ws, "b/f/f", b"v1");
    let sync = synchronizer(&ws);
    let handle = sync.watch().await.unwrap();
    assert_eq!(find(&sync, "b", "f").unwrap().raw_data, b"v1");

    put(&ws, "b/g/meta.json", br#"{"k":"v"}"#);
    let has_meta = || {
        find(&sync, "b", "g")
            .map(|f| f.meta_data.get("k") == Some(&serde_json::json!("v")))
            .unwrap_or(false)
    };
    assert!(eventually(has_meta).await);

    put(&ws, "b/f/script.lua", b"return 1");
    assert!(eventually(|| find(&sync, "b", "f").map(|f| !f.lua_script.is_empty()).unwrap_or(false)).await);

    fs::remove_file(ws.join("b/f/script.lua")).unwrap();
    assert!(eventually(|| find(&sync, "b", "f").map(|f| f.lua_script.is_empty()).unwrap_or(false)).await);

    fs::remove_dir_all(ws.join("b/g")).unwrap();
    assert!(eventually(|| matches!(find(&sync, "b", "g"), Err(e) if e.is_not_found())).await);

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn offline_deletions_surface_on_first_tick() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    put(&ws, "b/keep/keep", b"k");
    put(&ws, "b/gone/gone", b"g");

    // A first run imports and persists the snapshot.
    let first = synchronizer(&ws);
    assert!(matches!(first.sync().unwrap(), InitOutcome::Imported(_)));
    let mut source =
        PollingSource::new(&ws, Duration::from_millis(25), Default::default()).unwrap();
    assert!(source.scan_changes().unwrap().is_empty());

    // Simulate a restart: the second synchronizer shares the store.
    let store = Arc::clone(first.store());
    drop(first);
    fs::remove_dir_all(ws.join("b/gone")).unwrap();

    let mut config = SyncConfig::with_workspace(&ws);
    config.poll_interval_ms = 25;
    let sync = Synchronizer::new(store, config);
    let handle = sync.watch().await.unwrap();

    assert!(eventually(|| matches!(find(&sync, "b", "gone"), Err(e) if e.is_not_found())).await);
    assert!(find(&sync, "b", "keep").is_ok());
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn strict_driver_reports_bucket_removal() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    put(&ws, "doomed/f/f", b"x");

    let store: Arc<dyn DbManager> = Arc::new(RedbStore::in_memory().unwrap());
    let mut config = SyncConfig::with_workspace(&ws);
    config.poll_interval_ms = 10;
    config.import_policy = ImportPolicy::Strict;
    let sync = Synchronizer::new(store, config);
    let handle = sync.watch().await.unwrap();

    fs::remove_dir_all(ws.join("doomed")).unwrap();
    assert!(eventually(|| handle.is_finished()).await);
    let err = handle.stop().await.unwrap_err();
    assert!(matches!(err, fader_sync::SyncError::BucketRemovalUnsupported(_)));
}
