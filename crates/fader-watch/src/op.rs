//! Raw and classified watch operations.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A low-level notification kind, independent of the OS backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawOp {
    Create,
    Write,
    Remove,
    /// The path was renamed away. The new name arrives as a `Create`.
    Rename,
    Chmod,
}

/// One normalized notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub op: RawOp,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(op: RawOp, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }

    /// The directory whose window this event belongs to.
    pub fn parent(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Translate a notify event into zero or more raw events.
///
/// Access notifications carry no change and are dropped. A rename reported
/// as one event with both paths becomes a `Rename` of the old path plus a
/// `Create` of the new one.
pub fn normalize(event: &Event) -> Vec<RawEvent> {
    let every = |op: RawOp| {
        event
            .paths
            .iter()
            .map(|p| RawEvent::new(op, p.clone()))
            .collect::<Vec<_>>()
    };

    match &event.kind {
        EventKind::Create(_) => every(RawOp::Create),
        EventKind::Remove(_) => every(RawOp::Remove),
        EventKind::Modify(ModifyKind::Metadata(_)) => every(RawOp::Chmod),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => every(RawOp::Rename),
            RenameMode::To => every(RawOp::Create),
            RenameMode::Both => match event.paths.as_slice() {
                [from, to, ..] => vec![
                    RawEvent::new(RawOp::Rename, from.clone()),
                    RawEvent::new(RawOp::Create, to.clone()),
                ],
                _ => Vec::new(),
            },
            // Backends that cannot tell the two ends apart: a surviving path
            // is the new name.
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let op = if p.exists() {
                        RawOp::Create
                    } else {
                        RawOp::Rename
                    };
                    RawEvent::new(op, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => every(RawOp::Write),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// A semantic operation inferred from a window of raw events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchOp {
    ModifyOrCreateFile,
    CreateFileOrFolder,
    RemoveFileOrFolder,
    RenameFolder,
    RenameFile,
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ModifyOrCreateFile => "ModifyOrCreateFile",
            Self::CreateFileOrFolder => "CreateFileOrFolder",
            Self::RemoveFileOrFolder => "RemoveFileOrFolder",
            Self::RenameFolder => "RenameFolder",
            Self::RenameFile => "RenameFile",
        };
        f.write_str(s)
    }
}

/// A classified operation delivered to a watch hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub op: WatchOp,
    /// The affected path; for renames, the new path.
    pub path: PathBuf,
    /// The previous path of a rename.
    pub old_path: Option<PathBuf>,
}

impl WatchEvent {
    pub fn new(op: WatchOp, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
            old_path: None,
        }
    }

    pub fn rename(op: WatchOp, old_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
            old_path: Some(old_path.into()),
        }
    }
}
