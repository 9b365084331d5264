//! Change sources feeding the synchronizer.
//!
//! A [`ChangeSource`] yields batches of workspace-relative [`Change`]s. The
//! synchronizer applies a batch and then calls [`ChangeSource::commit`], so a
//! source can hold back state (such as a tree baseline) until the batch has
//! been applied.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fader_fstree::{calculate, FsTree, ScanOptions, TreeOperation};
use fader_watch::{LiveWatcher, WatchConfig, WatchEvent, WatchHook, WatchOp, WatcherHandle};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::{SyncError, SyncResult};

/// What happened at a workspace path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The path was created or modified.
    Upsert,
    /// The path is gone.
    Remove,
}

/// One change at a path relative to the workspace root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn upsert(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Upsert,
            path: path.into(),
        }
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            path: path.into(),
        }
    }

    /// Map a diff operation onto a change.
    pub fn from_tree_op(op: &TreeOperation) -> Self {
        if op.kind.is_upsert() {
            Self::upsert(&op.path)
        } else {
            Self::remove(&op.path)
        }
    }

    /// Map a live watcher event under `root` onto changes. A rename becomes a
    /// removal of the old path followed by an upsert of the new one. Paths
    /// outside `root` are dropped.
    pub fn from_watch_event(root: &WatchRoot, event: &WatchEvent) -> Vec<Self> {
        let mut changes = Vec::with_capacity(2);
        match event.op {
            WatchOp::ModifyOrCreateFile | WatchOp::CreateFileOrFolder => {
                changes.extend(root.relative(&event.path).map(Self::upsert));
            }
            WatchOp::RemoveFileOrFolder => {
                changes.extend(root.relative(&event.path).map(Self::remove));
            }
            WatchOp::RenameFile | WatchOp::RenameFolder => {
                if let Some(old) = &event.old_path {
                    changes.extend(root.relative(old).map(Self::remove));
                }
                changes.extend(root.relative(&event.path).map(Self::upsert));
            }
        }
        changes.retain(|c| !c.path.as_os_str().is_empty());
        changes
    }
}

/// A workspace root as configured and as resolved on disk.
///
/// Backends report event paths under the path a watch was started on, or
/// under its resolved form on platforms that resolve links. Both are
/// accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchRoot {
    given: PathBuf,
    resolved: Option<PathBuf>,
}

impl WatchRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let given = root.into();
        let resolved = given.canonicalize().ok().filter(|r| *r != given);
        Self { given, resolved }
    }

    /// The root as configured.
    pub fn path(&self) -> &Path {
        &self.given
    }

    /// `path` relative to the root, or `None` if it lies outside.
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(rest) = path.strip_prefix(&self.given) {
            return Some(rest.to_path_buf());
        }
        match &self.resolved {
            Some(resolved) => path.strip_prefix(resolved).ok().map(Path::to_path_buf),
            // The root may not have existed when this was built.
            None => {
                let resolved = self.given.canonicalize().ok()?;
                path.strip_prefix(resolved).ok().map(Path::to_path_buf)
            }
        }
    }
}

/// A producer of change batches.
#[async_trait]
pub trait ChangeSource: Send {
    /// Wait for the next non-empty batch. `None` means the source is
    /// exhausted and the driver should stop.
    async fn next_batch(&mut self) -> SyncResult<Option<Vec<Change>>>;

    /// Acknowledge that the last batch was applied.
    async fn commit(&mut self) -> SyncResult<()>;

    /// Release any resources held by the source.
    async fn close(&mut self) -> SyncResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Scans the workspace on a fixed interval and diffs each scan against the
/// persisted baseline.
///
/// The baseline only advances, and is only saved, after a non-empty batch is
/// committed. The first tick fires immediately.
pub struct PollingSource {
    root: PathBuf,
    interval: Duration,
    options: ScanOptions,
    baseline: FsTree,
    pending: Option<FsTree>,
    ticker: Option<Interval>,
}

impl PollingSource {
    /// Start from the persisted baseline under `root`, scanning and saving
    /// one if there is none.
    pub fn new(root: impl Into<PathBuf>, interval: Duration, options: ScanOptions) -> SyncResult<Self> {
        let root = root.into();
        let baseline = FsTree::load_or_scan(root.clone(), &options)?;
        Ok(Self::with_baseline(baseline, interval, options))
    }

    pub fn with_baseline(baseline: FsTree, interval: Duration, options: ScanOptions) -> Self {
        Self {
            root: baseline.root().to_path_buf(),
            interval,
            options,
            baseline,
            pending: None,
            ticker: None,
        }
    }

    pub fn baseline(&self) -> &FsTree {
        &self.baseline
    }

    /// Scan now and return the changes since the baseline. A non-empty
    /// result is held until [`commit_baseline`](Self::commit_baseline).
    pub fn scan_changes(&mut self) -> SyncResult<Vec<Change>> {
        let current = FsTree::scan(self.root.clone(), &self.options)?;
        Ok(self.stage(current))
    }

    /// Promote the held scan to baseline and persist it.
    pub fn commit_baseline(&mut self) -> SyncResult<()> {
        if let Some(tree) = self.pending.take() {
            tree.save()?;
            debug!(root = %self.root.display(), items = tree.len(), "baseline advanced");
            self.baseline = tree;
        }
        Ok(())
    }

    fn stage(&mut self, current: FsTree) -> Vec<Change> {
        let ops = calculate(&self.baseline, &current);
        for op in &ops {
            trace!(op = %op, "tree operation");
        }
        if ops.is_empty() {
            self.pending = None;
            return Vec::new();
        }
        self.pending = Some(current);
        ops.iter().map(Change::from_tree_op).collect()
    }

    async fn tick(&mut self) {
        let period = self.interval;
        self.ticker
            .get_or_insert_with(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            })
            .tick()
            .await;
    }
}

#[async_trait]
impl ChangeSource for PollingSource {
    async fn next_batch(&mut self) -> SyncResult<Option<Vec<Change>>> {
        loop {
            self.tick().await;
            let root = self.root.clone();
            let options = self.options;
            let current = tokio::task::spawn_blocking(move || FsTree::scan(root, &options))
                .await
                .map_err(|e| SyncError::Task(e.to_string()))??;

            let changes = self.stage(current);
            if !changes.is_empty() {
                return Ok(Some(changes));
            }
        }
    }

    async fn commit(&mut self) -> SyncResult<()> {
        self.commit_baseline()
    }
}

impl std::fmt::Debug for PollingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingSource")
            .field("root", &self.root)
            .field("interval", &self.interval)
            .field("baseline_items", &self.baseline.len())
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Live
// ---------------------------------------------------------------------------

/// Classified OS notifications from a [`LiveWatcher`].
///
/// Each batch holds whatever events arrived since the previous one.
#[derive(Debug)]
pub struct LiveSource {
    root: WatchRoot,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    watcher: Option<WatcherHandle>,
}

impl LiveSource {
    /// Start watching `root`. Must be called inside a tokio runtime.
    pub fn start(root: impl Into<PathBuf>, config: WatchConfig) -> SyncResult<Self> {
        let root = root.into();
        let (tx, events) = mpsc::unbounded_channel();
        let hook: WatchHook = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        let watcher = LiveWatcher::start(root.clone(), config, hook)?;
        Ok(Self {
            root: WatchRoot::new(root),
            events,
            watcher: Some(watcher),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

#[async_trait]
impl ChangeSource for LiveSource {
    async fn next_batch(&mut self) -> SyncResult<Option<Vec<Change>>> {
        loop {
            let Some(first) = self.events.recv().await else {
                return Ok(None);
            };
            let mut changes = Change::from_watch_event(&self.root, &first);
            while let Ok(event) = self.events.try_recv() {
                changes.extend(Change::from_watch_event(&self.root, &event));
            }
            if !changes.is_empty() {
                return Ok(Some(changes));
            }
        }
    }

    async fn commit(&mut self) -> SyncResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> SyncResult<()> {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fader_fstree::OpKind;
    use std::fs;

    #[test]
    fn tree_ops_map_to_changes() {
        let c = Change::from_tree_op(&TreeOperation::new(OpKind::Mkdir, "b"));
        assert_eq!(c, Change::upsert("b"));
        let c = Change::from_tree_op(&TreeOperation::new(OpKind::Unlink, "b/f/f"));
        assert_eq!(c, Change::remove("b/f/f"));
    }

    #[test]
    fn watch_events_are_made_relative() {
        let root = &WatchRoot::new("/w");
        let event = WatchEvent::new(WatchOp::ModifyOrCreateFile, "/w/b/f/meta.json");
        assert_eq!(
            Change::from_watch_event(root, &event),
            vec![Change::upsert("b/f/meta.json")]
        );

        let outside = WatchEvent::new(WatchOp::RemoveFileOrFolder, "/elsewhere/x");
        assert!(Change::from_watch_event(root, &outside).is_empty());

        let on_root = WatchEvent::new(WatchOp::CreateFileOrFolder, "/w");
        assert!(Change::from_watch_event(root, &on_root).is_empty());
    }

    #[test]
    fn rename_is_remove_then_upsert() {
        let event = WatchEvent::rename(WatchOp::RenameFolder, "/w/b/old", "/w/b/new");
        assert_eq!(
            Change::from_watch_event(&WatchRoot::new("/w"), &event),
            vec![Change::remove("b/old"), Change::upsert("b/new")]
        );
    }

    #[test]
    fn relative_root_matches_given_and_resolved_paths() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let dotted = dir.path().join(".").join("real");
        let root = WatchRoot::new(&dotted);

        let given = WatchEvent::new(WatchOp::CreateFileOrFolder, dotted.join("b"));
        assert_eq!(Change::from_watch_event(&root, &given), vec![Change::upsert("b")]);

        let resolved = real.canonicalize().unwrap().join("b/f");
        let event = WatchEvent::new(WatchOp::RemoveFileOrFolder, resolved);
        assert_eq!(Change::from_watch_event(&root, &event), vec![Change::remove("b/f")]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_matches_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let root = WatchRoot::new(&link);

        let via_link = WatchEvent::new(WatchOp::ModifyOrCreateFile, link.join("b/f/f"));
        assert_eq!(Change::from_watch_event(&root, &via_link), vec![Change::upsert("b/f/f")]);

        let via_target =
            WatchEvent::new(WatchOp::ModifyOrCreateFile, real.canonicalize().unwrap().join("b/f/f"));
        assert_eq!(Change::from_watch_event(&root, &via_target), vec![Change::upsert("b/f/f")]);
    }

    #[test]
    fn polling_holds_baseline_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut source =
            PollingSource::new(root, Duration::from_millis(10), ScanOptions::default()).unwrap();
        assert!(source.scan_changes().unwrap().is_empty());

        fs::create_dir_all(root.join("b/f")).unwrap();
        fs::write(root.join("b/f/f"), b"x").unwrap();
        let changes = source.scan_changes().unwrap();
        assert_eq!(
            changes,
            vec![
                Change::upsert("b"),
                Change::upsert("b/f"),
                Change::upsert("b/f/f"),
            ]
        );

        // Not committed, so the same changes show up again.
        assert_eq!(source.scan_changes().unwrap().len(), 3);
        source.commit_baseline().unwrap();
        assert!(source.scan_changes().unwrap().is_empty());

        // The committed baseline was persisted.
        let reloaded = FsTree::load(root).unwrap();
        assert!(reloaded.contains("b/f/f"));
    }

    #[tokio::test]
    async fn polling_batch_reports_removal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/f")).unwrap();
        fs::write(root.join("b/f/f"), b"x").unwrap();
        let mut source =
            PollingSource::new(root, Duration::from_millis(10), ScanOptions::default()).unwrap();

        fs::remove_file(root.join("b/f/f")).unwrap();
        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch, vec![Change::remove("b/f/f")]);
        source.commit().await.unwrap();
        assert!(!source.baseline().contains("b/f/f"));
    }
}
