//! Live drivers end to end against the real OS notification backend.
//!
//! Directories are created one level at a time with a pause in between so
//! the watcher has registered each new directory before anything lands in it.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fader_store::{BucketManager, DbManager, FileManager, RedbStore, StoreResult};
use fader_sync::{SyncConfig, Synchronizer};
use fader_types::{DataUsed, File, ImportPolicy};
use fader_watch::{LiveWatcher, WatchConfig};

const SETTLE: Duration = Duration::from_millis(300);

fn synchronizer(workspace: &Path) -> Synchronizer {
    let store: Arc<dyn DbManager> = Arc::new(RedbStore::in_memory().unwrap());
    let mut config = SyncConfig::with_workspace(workspace);
    config.import_policy = ImportPolicy::BestEffort;
    Synchronizer::new(store, config)
}

fn find(sync: &Synchronizer, bucket: &str, file: &str) -> StoreResult<File> {
    let bucket = sync.store().find_bucket_by_name(bucket, DataUsed::PRIMARY_IDS)?;
    sync.store()
        .find_file_by_name(&bucket.id, file, DataUsed::FULL_FILE)
}

fn has_bucket(sync: &Synchronizer, bucket: &str) -> bool {
    sync.store()
        .find_bucket_by_name(bucket, DataUsed::PRIMARY_IDS)
        .is_ok()
}

/// Poll `check` until it holds or three seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..120 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

async fn mkdir(path: &Path) {
    fs::create_dir(path).unwrap();
    tokio::time::sleep(SETTLE).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_driver_follows_the_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    let sync = synchronizer(&ws);
    let handle = sync.watch_live().await.unwrap();
    tokio::time::sleep(SETTLE).await;

    mkdir(&ws.join("b")).await;
    assert!(eventually(|| has_bucket(&sync, "b")).await);

    mkdir(&ws.join("b/f")).await;
    fs::write(ws.join("b/f/f"), b"v1").unwrap();
    assert!(eventually(|| find(&sync, "b", "f").map(|f| f.raw_data == b"v1").unwrap_or(false)).await);

    fs::write(ws.join("b/f/meta.json"), br#"{"k":"v"}"#).unwrap();
    let has_meta = || {
        find(&sync, "b", "f")
            .map(|f| f.meta_data.get("k") == Some(&serde_json::json!("v")))
            .unwrap_or(false)
    };
    assert!(eventually(has_meta).await);

    fs::write(ws.join("b/f/f"), b"v2").unwrap();
    assert!(eventually(|| find(&sync, "b", "f").map(|f| f.raw_data == b"v2").unwrap_or(false)).await);

    fs::remove_dir_all(ws.join("b/f")).unwrap();
    assert!(eventually(|| matches!(find(&sync, "b", "f"), Err(e) if e.is_not_found())).await);
    assert!(has_bucket(&sync, "b"));

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_driver_holds_the_driver_slot() {
    let dir = tempfile::tempdir().unwrap();
    let sync = synchronizer(&dir.path().join("ws"));
    let handle = sync.watch_live().await.unwrap();
    assert!(matches!(
        sync.watch().await,
        Err(fader_sync::SyncError::DriverActive)
    ));
    handle.stop().await.unwrap();

    let polling = sync.watch().await.unwrap();
    polling.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_func_applies_events_directly() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    let sync = synchronizer(&ws);
    sync.sync().unwrap();

    let watcher = LiveWatcher::start(&ws, WatchConfig::default(), sync.make_watch_func()).unwrap();
    tokio::time::sleep(SETTLE).await;

    mkdir(&ws.join("b")).await;
    assert!(eventually(|| has_bucket(&sync, "b")).await);
    mkdir(&ws.join("b/f")).await;
    fs::write(ws.join("b/f/script.lua"), b"return 1").unwrap();
    assert!(eventually(|| find(&sync, "b", "f").map(|f| f.lua_script == b"return 1").unwrap_or(false)).await);

    watcher.stop().await;
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_func_on_symlinked_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real");
    fs::create_dir_all(&real).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let sync = synchronizer(&link);
    sync.sync().unwrap();
    let watcher =
        LiveWatcher::start(&link, WatchConfig::default(), sync.make_watch_func()).unwrap();
    tokio::time::sleep(SETTLE).await;

    mkdir(&link.join("b")).await;
    assert!(eventually(|| has_bucket(&sync, "b")).await);

    mkdir(&link.join("b/f")).await;
    fs::write(link.join("b/f/f"), b"through the link").unwrap();
    let imported = || {
        find(&sync, "b", "f")
            .map(|f| f.raw_data == b"through the link")
            .unwrap_or(false)
    };
    assert!(eventually(imported).await);

    watcher.stop().await;
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_driver_on_symlinked_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real");
    fs::create_dir_all(&real).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let sync = synchronizer(&link);
    let handle = sync.watch_live().await.unwrap();
    tokio::time::sleep(SETTLE).await;

    mkdir(&link.join("b")).await;
    assert!(eventually(|| has_bucket(&sync, "b")).await);

    handle.stop().await.unwrap();
}
