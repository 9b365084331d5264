//! Snapshot diffing.
//!
//! [`calculate`] compares two [`FsTree`] snapshots by path. It knows nothing
//! about renames: a moved file shows up as an `unlink` plus a `create`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::FsTree;

/// Kind of filesystem operation found by a diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Mkdir,
    Create,
    Change,
    Rmdir,
    Unlink,
}

impl OpKind {
    /// `mkdir`, `create` and `change`.
    pub fn is_upsert(self) -> bool {
        matches!(self, Self::Mkdir | Self::Create | Self::Change)
    }

    /// `rmdir` and `unlink`.
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Rmdir | Self::Unlink)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mkdir => "mkdir",
            Self::Create => "create",
            Self::Change => "change",
            Self::Rmdir => "rmdir",
            Self::Unlink => "unlink",
        };
        f.write_str(s)
    }
}

/// One operation on a path relative to the tree root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOperation {
    pub kind: OpKind,
    pub path: String,
}

impl TreeOperation {
    pub fn new(kind: OpKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl fmt::Display for TreeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// Operations that turn `previous` into `current`.
///
/// Additions come first in path order (parents before children), then
/// content changes in path order, then removals in reverse path order
/// (children before parents). A path whose kind flipped between file and
/// directory is reported as an addition of its new kind.
pub fn calculate(previous: &FsTree, current: &FsTree) -> Vec<TreeOperation> {
    let mut additions = Vec::new();
    let mut changes = Vec::new();

    for (path, item) in current.items() {
        match previous.get(path) {
            None => additions.push(added(path, item.is_dir)),
            Some(old) if old.is_dir != item.is_dir => additions.push(added(path, item.is_dir)),
            Some(old) if old.content_differs(item) => {
                changes.push(TreeOperation::new(OpKind::Change, path.clone()));
            }
            Some(_) => {}
        }
    }

    let removals = previous
        .items()
        .iter()
        .rev()
        .filter(|(path, _)| !current.contains(path))
        .map(|(path, item)| {
            let kind = if item.is_dir {
                OpKind::Rmdir
            } else {
                OpKind::Unlink
            };
            TreeOperation::new(kind, path.clone())
        });

    additions.extend(changes);
    additions.extend(removals);
    additions
}

fn added(path: &str, is_dir: bool) -> TreeOperation {
    let kind = if is_dir { OpKind::Mkdir } else { OpKind::Create };
    TreeOperation::new(kind, path)
}
