//! Directory snapshots.
//!
//! [`FsTree`] keeps a `BTreeMap<String, TreeItem>` keyed by relative path.
//! Scanning skips version-control metadata directories and the tree's own
//! state file, so persisting a snapshot never shows up as a change.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{FsTreeError, FsTreeResult};
use crate::item::TreeItem;

/// Name of the persisted snapshot inside the tree root.
pub const STATE_FILE: &str = ".fader_index";

const STATE_TMP_FILE: &str = ".fader_index.tmp";

const IGNORED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Returns `true` for names a scan never records.
pub fn is_ignored_name(name: &str) -> bool {
    IGNORED_DIRS.contains(&name) || name == STATE_FILE || name == STATE_TMP_FILE
}

/// Returns `true` if `root` contains anything a scan would record.
///
/// A missing root counts as empty.
pub fn dir_has_entries(root: &Path) -> FsTreeResult<bool> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(FsTreeError::io(root, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| FsTreeError::io(root, e))?;
        if !is_ignored_name(&entry.file_name().to_string_lossy()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Scan tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Record a BLAKE3 digest of every file so that touched but unchanged
    /// files do not diff as changes.
    pub hash_contents: bool,
}

/// A snapshot of a directory subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsTree {
    root: PathBuf,
    items: BTreeMap<String, TreeItem>,
}

impl FsTree {
    /// An empty snapshot of `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            items: BTreeMap::new(),
        }
    }

    /// Build a snapshot from already-known items.
    pub fn from_items(root: impl Into<PathBuf>, items: impl IntoIterator<Item = TreeItem>) -> Self {
        Self {
            root: root.into(),
            items: items.into_iter().map(|i| (i.path.clone(), i)).collect(),
        }
    }

    /// Walk `root` and record every path below it.
    ///
    /// A missing root yields an empty tree. Paths that vanish while the walk
    /// is running are skipped.
    pub fn scan(root: impl Into<PathBuf>, options: &ScanOptions) -> FsTreeResult<Self> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(meta) if !meta.is_dir() => return Err(FsTreeError::NotADirectory(root)),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %root.display(), "scan root missing, using empty tree");
                return Ok(Self::new(root));
            }
            Err(e) => return Err(FsTreeError::io(&root, e)),
        }

        let mut items = BTreeMap::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_ignored_name(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(e.into()),
            };
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(e.into()),
            };
            let Some(path) = relative_path(&root, entry.path()) else {
                continue;
            };
            let mod_time = meta
                .modified()
                .map_err(|e| FsTreeError::io(entry.path(), e))?;

            let item = if meta.is_dir() {
                TreeItem::dir(path, mod_time)
            } else {
                let mut item = TreeItem::file(path, meta.len(), mod_time);
                if options.hash_contents {
                    match fs::read(entry.path()) {
                        Ok(bytes) => item.hash = Some(blake3::hash(&bytes).to_hex().to_string()),
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(FsTreeError::io(entry.path(), e)),
                    }
                }
                item
            };
            items.insert(item.path.clone(), item);
        }

        debug!(root = %root.display(), items = items.len(), "tree scanned");
        Ok(Self { root, items })
    }

    /// Path of the state file for `root`.
    pub fn state_path(root: &Path) -> PathBuf {
        root.join(STATE_FILE)
    }

    /// Returns `true` if a persisted snapshot exists under `root`.
    pub fn state_exists(root: &Path) -> bool {
        Self::state_path(root).is_file()
    }

    /// Load the persisted snapshot of `root`.
    pub fn load(root: impl Into<PathBuf>) -> FsTreeResult<Self> {
        let root = root.into();
        let path = Self::state_path(&root);
        let bytes = fs::read(&path).map_err(|e| FsTreeError::io(&path, e))?;
        let items: BTreeMap<String, TreeItem> = serde_json::from_slice(&bytes)?;
        Ok(Self { root, items })
    }

    /// Load the persisted snapshot, or scan and persist a fresh one when it
    /// is missing or unreadable.
    pub fn load_or_scan(root: impl Into<PathBuf>, options: &ScanOptions) -> FsTreeResult<Self> {
        let root = root.into();
        if Self::state_exists(&root) {
            match Self::load(root.clone()) {
                Ok(tree) => return Ok(tree),
                Err(e) => warn!(root = %root.display(), error = %e, "discarding unreadable tree state"),
            }
        }
        let tree = Self::scan(root, options)?;
        tree.save()?;
        Ok(tree)
    }

    /// Persist the snapshot as JSON at `<root>/.fader_index`.
    ///
    /// The file is written next to its final location and renamed into place.
    pub fn save(&self) -> FsTreeResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| FsTreeError::io(&self.root, e))?;
        let bytes = serde_json::to_vec(&self.items)?;
        let tmp = self.root.join(STATE_TMP_FILE);
        let path = Self::state_path(&self.root);
        fs::write(&tmp, bytes).map_err(|e| FsTreeError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| FsTreeError::io(&path, e))?;
        debug!(path = %path.display(), items = self.items.len(), "tree state saved");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&TreeItem> {
        self.items.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    /// Items in path order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeItem> {
        self.items.values()
    }

    pub fn items(&self) -> &BTreeMap<String, TreeItem> {
        &self.items
    }
}

fn is_vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
