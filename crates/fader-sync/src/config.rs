use std::path::{Path, PathBuf};
use std::time::Duration;

use fader_fstree::ScanOptions;
use fader_types::ImportPolicy;
use fader_watch::WatchConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Which change source drives steady-state reconciliation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Periodic tree scans diffed against the persisted snapshot.
    #[default]
    Poll,
    /// OS notifications through the live watcher.
    Live,
}

/// Synchronizer settings. Every key is optional in TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub workspace: PathBuf,
    pub poll_interval_ms: u64,
    pub watch_window_ms: u64,
    pub import_policy: ImportPolicy,
    pub hash_contents: bool,
    pub driver: DriverKind,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("./workspace"),
            poll_interval_ms: 1250,
            watch_window_ms: 20,
            import_policy: ImportPolicy::BestEffort,
            hash_contents: false,
            driver: DriverKind::Poll,
        }
    }
}

impl SyncConfig {
    /// Defaults with a different workspace root.
    pub fn with_workspace(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            hash_contents: self.hash_contents,
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            window: Duration::from_millis(self.watch_window_ms),
        }
    }
}
