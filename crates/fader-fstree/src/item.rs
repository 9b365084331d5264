//! Snapshot entries.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// One path recorded in an [`FsTree`](crate::FsTree).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    /// Last modification time.
    pub mod_time: SystemTime,
    pub is_dir: bool,
    /// BLAKE3 hex digest of the contents, when the scan hashed files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl TreeItem {
    /// A file entry without a content hash.
    pub fn file(path: impl Into<String>, size: u64, mod_time: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            mod_time,
            is_dir: false,
            hash: None,
        }
    }

    /// A directory entry.
    pub fn dir(path: impl Into<String>, mod_time: SystemTime) -> Self {
        Self {
            path: path.into(),
            size: 0,
            mod_time,
            is_dir: true,
            hash: None,
        }
    }

    /// Number of path components, so `bucket/file` has depth 2.
    pub fn depth(&self) -> usize {
        self.path.split('/').filter(|c| !c.is_empty()).count()
    }

    /// Returns `true` if `other` describes different file contents.
    ///
    /// Hashes are compared when both sides carry one; otherwise size and
    /// modification time decide. Directories never differ.
    pub fn content_differs(&self, other: &TreeItem) -> bool {
        if self.is_dir || other.is_dir {
            return false;
        }
        if self.size != other.size {
            return true;
        }
        match (&self.hash, &other.hash) {
            (Some(a), Some(b)) => a != b,
            _ => self.mod_time != other.mod_time,
        }
    }
}
