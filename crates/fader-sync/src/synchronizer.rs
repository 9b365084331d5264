//! Initialization direction and steady-state drivers.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fader_fstree::{dir_has_entries, FsTree};
use fader_store::{BucketImportManager, BucketManager, DbManager, FileManager};
use fader_types::DataUsed;
use fader_watch::{WatchEvent, WatchHook};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::layout::{bucket_dir, file_dir, WorkspacePath};
use crate::source::{Change, ChangeKind, ChangeSource, LiveSource, PollingSource, WatchRoot};
use crate::workspace::{ExportStats, ImportStats, WorkspaceExporter, WorkspaceImporter};

/// What [`Synchronizer::init`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// Both the store and the workspace were empty.
    Noop,
    /// The store was copied into an empty workspace.
    Exported(ExportStats),
    /// The workspace was copied into the store.
    Imported(ImportStats),
    /// Initialization had already run.
    AlreadyDone,
}

/// Result of applying a batch of changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

/// Keeps a store and its workspace directory consistent.
///
/// Cheap to clone; clones share the init guard and the driver slot. At most
/// one driver (polling or live) runs per synchronizer.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn DbManager>,
    config: SyncConfig,
    importer: WorkspaceImporter,
    exporter: WorkspaceExporter,
    initialized: Mutex<bool>,
    driver_active: AtomicBool,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn DbManager>, config: SyncConfig) -> Self {
        let importer =
            WorkspaceImporter::new(Arc::clone(&store), &config.workspace, config.import_policy);
        let exporter = WorkspaceExporter::new(Arc::clone(&store), &config.workspace);
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                importer,
                exporter,
                initialized: Mutex::new(false),
                driver_active: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn workspace(&self) -> &Path {
        &self.inner.config.workspace
    }

    pub fn store(&self) -> &Arc<dyn DbManager> {
        &self.inner.store
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Pick a direction and copy once.
    ///
    /// An empty workspace with a non-empty store is exported. A workspace
    /// with any entries is imported, whatever the store holds. Runs at most
    /// once per synchronizer; later calls return [`InitOutcome::AlreadyDone`].
    ///
    /// The persisted tree snapshot is kept as is when importing, so changes
    /// made while nothing was running show up on the first poll.
    pub fn init(&self) -> SyncResult<InitOutcome> {
        let mut initialized = self.inner.initialized.lock().expect("init lock poisoned");
        if *initialized {
            return Ok(InitOutcome::AlreadyDone);
        }

        let config = &self.inner.config;
        let root = &config.workspace;
        fs::create_dir_all(root).map_err(|e| SyncError::io(root, e))?;

        let workspace_has_entries = dir_has_entries(root)?;
        FsTree::load_or_scan(root.clone(), &config.scan_options())?;
        let store_has_buckets = self.inner.store.count_buckets()? > 0;

        let outcome = match (workspace_has_entries, store_has_buckets) {
            (false, false) => InitOutcome::Noop,
            (false, true) => {
                let stats = self.inner.exporter.export_all()?;
                FsTree::scan(root.clone(), &config.scan_options())?.save()?;
                InitOutcome::Exported(stats)
            }
            (true, _) => {
                if store_has_buckets {
                    warn!(
                        workspace = %root.display(),
                        "store and workspace both hold data, workspace wins"
                    );
                }
                InitOutcome::Imported(self.inner.importer.import_all()?)
            }
        };

        *initialized = true;
        info!(workspace = %root.display(), outcome = ?outcome, "synchronizer initialized");
        Ok(outcome)
    }

    /// One-shot reconcile. Guarantees [`init`](Self::init) has run.
    pub fn sync(&self) -> SyncResult<InitOutcome> {
        self.init()
    }

    async fn init_blocking(&self) -> SyncResult<InitOutcome> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.init())
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    // -----------------------------------------------------------------------
    // Drivers
    // -----------------------------------------------------------------------

    /// Start the polling driver: scan the workspace every
    /// `poll_interval_ms` and apply whatever changed since the baseline.
    pub async fn watch(&self) -> SyncResult<WatchHandle> {
        let guard = self.claim_driver()?;
        self.init_blocking().await?;
        let config = &self.inner.config;
        let source = PollingSource::new(
            config.workspace.clone(),
            config.poll_interval(),
            config.scan_options(),
        )?;
        info!(
            workspace = %config.workspace.display(),
            interval_ms = config.poll_interval_ms,
            "polling driver started"
        );
        Ok(self.spawn_driver(source, guard))
    }

    /// Start the live driver on OS notifications.
    pub async fn watch_live(&self) -> SyncResult<WatchHandle> {
        let guard = self.claim_driver()?;
        self.init_blocking().await?;
        let config = &self.inner.config;
        let source = LiveSource::start(config.workspace.clone(), config.watch_config())?;
        info!(workspace = %config.workspace.display(), "live driver started");
        Ok(self.spawn_driver(source, guard))
    }

    /// Start a driver on any change source.
    pub async fn watch_with<S>(&self, source: S) -> SyncResult<WatchHandle>
    where
        S: ChangeSource + 'static,
    {
        let guard = self.claim_driver()?;
        self.init_blocking().await?;
        Ok(self.spawn_driver(source, guard))
    }

    fn claim_driver(&self) -> SyncResult<DriverGuard> {
        tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        self.inner
            .driver_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::DriverActive)?;
        Ok(DriverGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    fn spawn_driver<S>(&self, source: S, guard: DriverGuard) -> WatchHandle
    where
        S: ChangeSource + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drive(self.clone(), source, stop_rx, guard));
        WatchHandle {
            stop: Some(stop_tx),
            task,
        }
    }

    /// A hook for a [`LiveWatcher`](fader_watch::LiveWatcher) started on the
    /// workspace root that applies each event directly.
    pub fn make_watch_func(&self) -> WatchHook {
        let this = self.clone();
        let root = WatchRoot::new(self.workspace());
        Arc::new(move |event: WatchEvent| {
            let changes = Change::from_watch_event(&root, &event);
            if let Err(e) = this.apply_changes(&changes) {
                error!(op = %event.op, path = %event.path.display(), error = %e, "watch event failed");
            }
        })
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    /// Apply a batch. Best-effort mode logs and counts failures; strict mode
    /// stops at the first one.
    pub fn apply_changes(&self, changes: &[Change]) -> SyncResult<ApplyReport> {
        let mut report = ApplyReport::default();
        for change in changes {
            match self.apply_change(change) {
                Ok(()) => report.applied += 1,
                Err(e) if self.inner.config.import_policy.is_strict() => return Err(e),
                Err(e) => {
                    warn!(path = %change.path.display(), kind = ?change.kind, error = %e, "change not applied");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Apply one workspace-relative change.
    ///
    /// Upserts re-import the whole file directory the path belongs to. A
    /// removed artifact re-imports its file directory if that still exists; a
    /// removed file directory deletes the file. Bucket directories cannot be
    /// removed.
    pub fn apply_change(&self, change: &Change) -> SyncResult<()> {
        let root = self.workspace();
        match (change.kind, WorkspacePath::parse(&change.path)) {
            (_, WorkspacePath::Other) => {
                debug!(path = %change.path.display(), "ignoring change outside the layout");
                Ok(())
            }
            (ChangeKind::Upsert, WorkspacePath::Bucket { bucket }) => {
                if bucket_dir(root, &bucket).is_dir() {
                    self.inner.importer.ensure_bucket(&bucket)?;
                }
                Ok(())
            }
            (ChangeKind::Upsert, WorkspacePath::FileDir { bucket, file })
            | (ChangeKind::Upsert, WorkspacePath::Artifact { bucket, file, .. })
            | (ChangeKind::Remove, WorkspacePath::Artifact { bucket, file, .. }) => {
                self.reimport(&bucket, &file)
            }
            (ChangeKind::Remove, WorkspacePath::FileDir { bucket, file }) => {
                if file_dir(root, &bucket, &file).is_dir() {
                    return self.reimport(&bucket, &file);
                }
                self.remove_file(&bucket, &file)
            }
            (ChangeKind::Remove, WorkspacePath::Bucket { bucket }) => {
                Err(SyncError::BucketRemovalUnsupported(bucket))
            }
        }
    }

    fn reimport(&self, bucket: &str, file: &str) -> SyncResult<()> {
        if !file_dir(self.workspace(), bucket, file).is_dir() {
            debug!(bucket, file, "file directory gone, nothing to import");
            return Ok(());
        }
        self.inner.importer.import_file_dir(bucket, file)?;
        Ok(())
    }

    fn remove_file(&self, bucket_name: &str, file_name: &str) -> SyncResult<()> {
        let store = &self.inner.store;
        let bucket = match store.find_bucket_by_name(bucket_name, DataUsed::PRIMARY_IDS) {
            Ok(bucket) => bucket,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let file = match store.find_file_by_name(&bucket.id, file_name, DataUsed::PRIMARY_IDS) {
            Ok(file) => file,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        store.delete_file(&file.id)?;
        info!(bucket = bucket_name, file = file_name, id = %file.id, "file removed");
        Ok(())
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("workspace", &self.inner.config.workspace)
            .field("driver_active", &self.inner.driver_active.load(Ordering::Acquire))
            .finish()
    }
}

/// Releases the driver slot when the driver task ends.
struct DriverGuard {
    inner: Arc<Inner>,
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        self.inner.driver_active.store(false, Ordering::Release);
    }
}

async fn drive<S: ChangeSource>(
    sync: Synchronizer,
    mut source: S,
    mut stop: oneshot::Receiver<()>,
    _guard: DriverGuard,
) -> SyncResult<()> {
    let strict = sync.config().import_policy.is_strict();
    let result = loop {
        let batch = tokio::select! {
            _ = &mut stop => break Ok(()),
            batch = source.next_batch() => batch,
        };
        let changes = match batch {
            Ok(Some(changes)) => changes,
            Ok(None) => break Ok(()),
            Err(e) if strict => break Err(e),
            Err(e) => {
                warn!(error = %e, "change source failed, retrying");
                continue;
            }
        };

        let worker = sync.clone();
        let count = changes.len();
        let applied = tokio::task::spawn_blocking(move || worker.apply_changes(&changes))
            .await
            .map_err(|e| SyncError::Task(e.to_string()));
        let report = match applied {
            Ok(Ok(report)) => report,
            Ok(Err(e)) | Err(e) => break Err(e),
        };
        if let Err(e) = source.commit().await {
            break Err(e);
        }
        info!(changes = count, applied = report.applied, failed = report.failed, "batch applied");
    };

    if let Err(e) = source.close().await {
        warn!(error = %e, "change source did not close cleanly");
    }
    match &result {
        Ok(()) => debug!("sync driver stopped"),
        Err(e) => error!(error = %e, "sync driver failed"),
    }
    result
}

/// Handle to a running driver.
pub struct WatchHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<SyncResult<()>>,
}

impl WatchHandle {
    /// Returns `true` once the driver has exited on its own or been stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the driver and wait for it. Returns the error that ended the
    /// driver, if any.
    pub async fn stop(mut self) -> SyncResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fader_store::RedbStore;
    use fader_types::{Bucket, File, ImportPolicy};

    fn setup(policy: ImportPolicy) -> (tempfile::TempDir, Synchronizer) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DbManager> = Arc::new(RedbStore::in_memory().unwrap());
        let mut config = SyncConfig::with_workspace(dir.path().join("ws"));
        config.import_policy = policy;
        (dir, Synchronizer::new(store, config))
    }

    #[test]
    fn init_on_empty_sides_is_noop_and_runs_once() {
        let (_dir, sync) = setup(ImportPolicy::Strict);
        assert_eq!(sync.init().unwrap(), InitOutcome::Noop);
        assert_eq!(sync.sync().unwrap(), InitOutcome::AlreadyDone);
        assert!(FsTree::state_exists(sync.workspace()));
    }

    #[test]
    fn init_exports_into_empty_workspace() {
        let (_dir, sync) = setup(ImportPolicy::Strict);
        let mut bucket = Bucket::new("b");
        sync.store().create_bucket(&mut bucket).unwrap();
        let mut file = File::new(bucket.id, "f");
        file.raw_data = b"data".to_vec();
        sync.store().create_file(&mut file).unwrap();

        let outcome = sync.init().unwrap();
        assert!(matches!(outcome, InitOutcome::Exported(s) if s.files == 1));
        assert_eq!(fs::read(sync.workspace().join("b/f/f")).unwrap(), b"data");
        assert!(FsTree::load(sync.workspace()).unwrap().contains("b/f/f"));
    }

    #[test]
    fn init_imports_non_empty_workspace() {
        let (_dir, sync) = setup(ImportPolicy::Strict);
        fs::create_dir_all(sync.workspace().join("b/f")).unwrap();
        fs::write(sync.workspace().join("b/f/f"), b"data").unwrap();

        let outcome = sync.init().unwrap();
        assert!(matches!(outcome, InitOutcome::Imported(s) if s.files == 1));
        assert_eq!(sync.store().count_buckets().unwrap(), 1);
    }

    #[test]
    fn removing_a_file_dir_deletes_the_file() {
        let (_dir, sync) = setup(ImportPolicy::Strict);
        let ws = sync.workspace().to_path_buf();
        fs::create_dir_all(ws.join("b/f")).unwrap();
        fs::write(ws.join("b/f/f"), b"x").unwrap();
        sync.init().unwrap();

        fs::remove_dir_all(ws.join("b/f")).unwrap();
        sync.apply_change(&Change::remove("b/f/f")).unwrap();
        sync.apply_change(&Change::remove("b/f")).unwrap();

        let bucket = sync.store().find_bucket_by_name("b", DataUsed::PRIMARY_IDS).unwrap();
        let err = sync
            .store()
            .find_file_by_name(&bucket.id, "f", DataUsed::NONE)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn bucket_removal_is_rejected() {
        let (_dir, sync) = setup(ImportPolicy::Strict);
        let err = sync.apply_change(&Change::remove("b")).unwrap_err();
        assert!(matches!(err, SyncError::BucketRemovalUnsupported(name) if name == "b"));
    }

    #[test]
    fn best_effort_counts_failures() {
        let (_dir, sync) = setup(ImportPolicy::BestEffort);
        let report = sync
            .apply_changes(&[Change::remove("b"), Change::upsert("b/missing/x")])
            .unwrap();
        assert_eq!(report, ApplyReport { applied: 1, failed: 1 });
    }

    #[tokio::test]
    async fn only_one_driver_at_a_time() {
        let (_dir, sync) = setup(ImportPolicy::BestEffort);
        let handle = sync.watch().await.unwrap();
        assert!(matches!(sync.watch().await, Err(SyncError::DriverActive)));
        handle.stop().await.unwrap();

        let again = sync.watch().await.unwrap();
        again.stop().await.unwrap();
    }

    #[test]
    fn drivers_need_a_runtime() {
        let (_dir, sync) = setup(ImportPolicy::BestEffort);
        let err = sync.claim_driver().err().unwrap();
        assert!(matches!(err, SyncError::NoRuntime));
    }
}
