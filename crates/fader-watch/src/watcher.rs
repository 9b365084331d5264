//! The notify-backed watch task.
//!
//! Every directory under the root gets its own non-recursive watch. Watches
//! follow the tree: a recognized folder creation or rename adds watches for
//! the new subtree, a recognized removal drops them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fader_fstree::is_ignored_name;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::coalescer::Coalescer;
use crate::error::{WatchError, WatchResult};
use crate::op::{normalize, WatchEvent, WatchOp};

/// Callback receiving classified operations. Runs on the blocking pool.
pub type WatchHook = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Watcher tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// How long a directory stays quiet before its window is classified.
    pub window: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(20),
        }
    }
}

/// Entry point for starting a live watch.
pub struct LiveWatcher;

impl LiveWatcher {
    /// Watch `root` and deliver classified operations to `hook`.
    ///
    /// Must be called from inside a tokio runtime. The watch runs until the
    /// returned handle is stopped or dropped.
    pub fn start(
        root: impl Into<PathBuf>,
        config: WatchConfig,
        hook: WatchHook,
    ) -> WatchResult<WatcherHandle> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only disappears once the task has stopped.
            let _ = event_tx.send(res);
        })?;
        let watched = watch_tree(&mut watcher, &root);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(run(watcher, event_rx, stop_rx, config, hook));

        info!(root = %root.display(), directories = watched, "live watcher started");
        Ok(WatcherHandle {
            root,
            stop: Some(stop_tx),
            task,
        })
    }
}

/// Handle to a running watch task.
pub struct WatcherHandle {
    root: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop the watch and wait for the task to finish. Open windows are
    /// discarded.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "watch task ended abnormally");
        }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

async fn run(
    mut watcher: RecommendedWatcher,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut stop: oneshot::Receiver<()>,
    config: WatchConfig,
    hook: WatchHook,
) {
    let mut coalescer = Coalescer::new(config.window);

    loop {
        let deadline = coalescer.next_deadline();
        tokio::select! {
            _ = &mut stop => break,
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    let now = Instant::now();
                    for raw in normalize(&event) {
                        if !is_ignored_path(&raw.path) {
                            coalescer.push(raw, now);
                        }
                    }
                }
                Some(Err(e)) => warn!(error = %e, "notify backend error"),
                None => break,
            },
            _ = sleep_until(deadline), if deadline.is_some() => {
                for event in coalescer.drain_due(Instant::now(), |p| p.is_dir()) {
                    follow(&mut watcher, &event);
                    dispatch(&hook, event);
                }
            }
        }
    }

    debug!("live watcher stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

fn dispatch(hook: &WatchHook, event: WatchEvent) {
    debug!(op = %event.op, path = %event.path.display(), "watch event");
    let hook = Arc::clone(hook);
    tokio::task::spawn_blocking(move || hook(event));
}

/// Keep the watch set in step with the tree.
fn follow(watcher: &mut RecommendedWatcher, event: &WatchEvent) {
    match event.op {
        WatchOp::CreateFileOrFolder if event.path.is_dir() => {
            watch_tree(watcher, &event.path);
        }
        WatchOp::RenameFolder => {
            if let Some(old) = &event.old_path {
                unwatch(watcher, old);
            }
            watch_tree(watcher, &event.path);
        }
        WatchOp::RemoveFileOrFolder => unwatch(watcher, &event.path),
        _ => {}
    }
}

/// Add a non-recursive watch for `root` and every directory below it.
/// Returns the number of directories watched.
fn watch_tree(watcher: &mut RecommendedWatcher, root: &Path) -> usize {
    let dirs = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_name(&e.file_name().to_string_lossy()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir());

    let mut count = 0;
    for dir in dirs {
        match watcher.watch(dir.path(), RecursiveMode::NonRecursive) {
            Ok(()) => count += 1,
            Err(e) => warn!(path = %dir.path().display(), error = %e, "failed to watch directory"),
        }
    }
    count
}

fn unwatch(watcher: &mut RecommendedWatcher, path: &Path) {
    // The backend usually drops watches of deleted directories on its own.
    if let Err(e) = watcher.unwatch(path) {
        debug!(path = %path.display(), error = %e, "unwatch skipped");
    }
}

fn is_ignored_path(path: &Path) -> bool {
    path.components()
        .any(|c| is_ignored_name(&c.as_os_str().to_string_lossy()))
}
