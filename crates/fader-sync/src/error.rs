//! Error types for the sync crate.

use std::path::PathBuf;

/// Errors that can occur while synchronizing a workspace.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] fader_store::StoreError),

    /// Tree scan or state file failure.
    #[error("tree error: {0}")]
    Tree(#[from] fader_fstree::FsTreeError),

    /// Live watcher failure.
    #[error("watch error: {0}")]
    Watch(#[from] fader_watch::WatchError),

    /// A workspace filesystem call failed.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workspace artifact could not be parsed.
    #[error("invalid artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    /// The configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A bucket or file name cannot be mapped to a directory.
    #[error("invalid workspace name: {0:?}")]
    InvalidName(String),

    /// Bucket directories cannot be removed through the workspace.
    #[error("bucket removal is not supported: {0}")]
    BucketRemovalUnsupported(String),

    /// Another driver is already running for this synchronizer.
    #[error("a sync driver is already active")]
    DriverActive,

    /// Drivers must be started from inside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// A background task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for sync results.
pub type SyncResult<T> = Result<T, SyncError>;
