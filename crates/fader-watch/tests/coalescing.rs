//! End-to-end coalescing against the real OS notification backend.
//!
//! Each step waits well past the window so that every logical action lands
//! in its own window; assertions are on exact hook invocation counts.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fader_watch::{LiveWatcher, WatchConfig, WatchEvent, WatchHook, WatchOp};

const SETTLE: Duration = Duration::from_millis(400);

fn recorder() -> (WatchHook, Arc<Mutex<Vec<WatchEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let hook: WatchHook = Arc::new(move |event| sink.lock().unwrap().push(event));
    (hook, seen)
}

fn count(seen: &Mutex<Vec<WatchEvent>>, op: WatchOp, path: &Path) -> usize {
    seen.lock()
        .unwrap()
        .iter()
        .filter(|e| e.op == op && e.path == path)
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_write_remove_are_reported_once_each() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let (hook, seen) = recorder();
    let handle = LiveWatcher::start(&root, WatchConfig::default(), hook).unwrap();
    tokio::time::sleep(SETTLE).await;

    let file = root.join("notes.txt");
    fs::File::create(&file).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(count(&seen, WatchOp::CreateFileOrFolder, &file), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    fs::write(&file, b"new content").unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(count(&seen, WatchOp::ModifyOrCreateFile, &file), 1);
    assert_eq!(seen.lock().unwrap().len(), 2);

    fs::remove_file(&file).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(count(&seen, WatchOp::RemoveFileOrFolder, &file), 1);
    assert_eq!(seen.lock().unwrap().len(), 3);

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_directories_are_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let (hook, seen) = recorder();
    let handle = LiveWatcher::start(&root, WatchConfig::default(), hook).unwrap();
    tokio::time::sleep(SETTLE).await;

    let bucket = root.join("bucket");
    fs::create_dir(&bucket).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(count(&seen, WatchOp::CreateFileOrFolder, &bucket), 1);

    let inner = bucket.join("inner.txt");
    fs::File::create(&inner).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(count(&seen, WatchOp::CreateFileOrFolder, &inner), 1);

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_watcher_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let (hook, seen) = recorder();
    let handle = LiveWatcher::start(&root, WatchConfig::default(), hook).unwrap();
    handle.stop().await;

    fs::File::create(root.join("late.txt")).unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(seen.lock().unwrap().is_empty());
}
