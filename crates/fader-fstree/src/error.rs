//! Error types for the fstree crate.

use std::path::PathBuf;

/// Errors that can occur while scanning, loading or saving a tree.
#[derive(Debug, thiserror::Error)]
pub enum FsTreeError {
    /// A filesystem call failed.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The persisted state file could not be encoded or decoded.
    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),

    /// The root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl FsTreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for fstree results.
pub type FsTreeResult<T> = Result<T, FsTreeError>;
