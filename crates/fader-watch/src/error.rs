//! Error types for the watch crate.

use std::path::PathBuf;

/// Errors that can occur while starting or running a watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The OS notification backend failed.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// The watch root does not exist or is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The watcher must be started from inside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

/// Convenience alias for watch results.
pub type WatchResult<T> = Result<T, WatchError>;
