//! Bulk copies between the store and the workspace directory.
//!
//! Import walks `<bucket>/<file>/<artifact>` top-down and rebuilds each file's
//! four content facets from whatever artifacts exist, so a deleted artifact
//! clears its field. Export writes only non-empty facets and never removes
//! stray files.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fader_fstree::is_ignored_name;
use fader_store::{
    BucketImportManager, BucketManager, DbManager, FileImportManager, FileManager, StoreError,
};
use fader_types::{Bucket, BucketId, DataUsed, File, ImportPolicy, StructuredMap};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::layout::{bucket_dir, file_dir, is_valid_name, ArtifactKind};

/// Counts from a workspace import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub buckets: usize,
    pub files: usize,
    /// File directories whose facets were already up to date.
    pub unchanged: usize,
    pub failed: usize,
}

/// Counts from a workspace export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub buckets: usize,
    pub files: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Materializes a workspace directory into the store.
#[derive(Clone)]
pub struct WorkspaceImporter {
    store: Arc<dyn DbManager>,
    root: PathBuf,
    policy: ImportPolicy,
}

impl WorkspaceImporter {
    pub fn new(store: Arc<dyn DbManager>, root: impl Into<PathBuf>, policy: ImportPolicy) -> Self {
        Self {
            store,
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Import every bucket directory and every file directory below it.
    pub fn import_all(&self) -> SyncResult<ImportStats> {
        let mut stats = ImportStats::default();
        for bucket_name in list_dirs(&self.root)? {
            match self.import_bucket_dir(&bucket_name, &mut stats) {
                Ok(()) => stats.buckets += 1,
                Err(e) => self.tolerate(&mut stats, &bucket_dir(&self.root, &bucket_name), e)?,
            }
        }
        info!(
            root = %self.root.display(),
            buckets = stats.buckets,
            files = stats.files,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "workspace imported"
        );
        Ok(stats)
    }

    fn import_bucket_dir(&self, bucket_name: &str, stats: &mut ImportStats) -> SyncResult<()> {
        let bucket = self.ensure_bucket(bucket_name)?;
        let dir = bucket_dir(&self.root, bucket_name);
        for file_name in list_dirs(&dir)? {
            match self.import_into(&bucket.id, &file_name) {
                Ok(true) => stats.files += 1,
                Ok(false) => {
                    stats.files += 1;
                    stats.unchanged += 1;
                }
                Err(e) => self.tolerate(stats, &dir.join(&file_name), e)?,
            }
        }
        Ok(())
    }

    fn tolerate(&self, stats: &mut ImportStats, path: &Path, err: SyncError) -> SyncResult<()> {
        if self.policy.is_strict() {
            return Err(err);
        }
        warn!(path = %path.display(), error = %err, "skipping workspace entry");
        stats.failed += 1;
        Ok(())
    }

    /// Look a bucket up by name, creating it when absent.
    pub fn ensure_bucket(&self, name: &str) -> SyncResult<Bucket> {
        if !is_valid_name(name) {
            return Err(SyncError::InvalidName(name.to_string()));
        }
        match self
            .store
            .find_bucket_by_name(name, DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES)
        {
            Ok(bucket) => Ok(bucket),
            Err(e) if e.is_not_found() => {
                let mut bucket = Bucket::new(name);
                self.store.create_bucket(&mut bucket)?;
                debug!(bucket = %bucket.id, name, "bucket created from workspace");
                Ok(bucket)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild one file entity from `<bucket>/<file>/`.
    pub fn import_file_dir(&self, bucket_name: &str, file_name: &str) -> SyncResult<File> {
        let bucket = self.ensure_bucket(bucket_name)?;
        self.import_into(&bucket.id, file_name)?;
        Ok(self
            .store
            .find_file_by_name(&bucket.id, file_name, DataUsed::FULL_FILE)?)
    }

    /// Returns `true` if the store was written.
    fn import_into(&self, bucket: &BucketId, file_name: &str) -> SyncResult<bool> {
        if !is_valid_name(file_name) {
            return Err(SyncError::InvalidName(file_name.to_string()));
        }
        let bucket_name = self
            .store
            .find_bucket(bucket, DataUsed::PRIMARY_NAMES)?
            .name;
        let dir = file_dir(&self.root, &bucket_name, file_name);

        let lookup = DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES | DataUsed::WORKSPACE_ARTIFACTS;
        let existing = match self.store.find_file_by_name(bucket, file_name, lookup) {
            Ok(file) => Some(file),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let mut file = existing
            .clone()
            .unwrap_or_else(|| File::new(*bucket, file_name));
        file.clear_artifacts();
        read_artifacts(&dir, &mut file)?;

        match existing {
            Some(previous) if same_artifacts(&previous, &file) => Ok(false),
            Some(_) => {
                self.store
                    .update_file_from(&mut file, DataUsed::WORKSPACE_ARTIFACTS)?;
                debug!(file = %file.id, path = %dir.display(), "file re-imported");
                Ok(true)
            }
            None => {
                self.store.create_file_from(
                    &mut file,
                    DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES | DataUsed::WORKSPACE_ARTIFACTS,
                )?;
                debug!(file = %file.id, path = %dir.display(), "file created from workspace");
                Ok(true)
            }
        }
    }
}

fn same_artifacts(a: &File, b: &File) -> bool {
    a.raw_data == b.raw_data
        && a.lua_script == b.lua_script
        && a.meta_data == b.meta_data
        && a.structural_data == b.structural_data
}

/// Fill the four facets of `file` from the artifacts in `dir`.
///
/// When several raw-data candidates exist, the one named after the file wins,
/// otherwise the first in name order.
fn read_artifacts(dir: &Path, file: &mut File) -> SyncResult<()> {
    let mut raw_taken = false;
    let mut names = list_files(dir)?;
    if let Some(pos) = names.iter().position(|n| *n == file.name) {
        let own = names.remove(pos);
        names.insert(0, own);
    }

    for name in names {
        let path = dir.join(&name);
        let kind = ArtifactKind::classify_for(&name, &file.name);
        if kind == ArtifactKind::RawData && raw_taken {
            debug!(path = %path.display(), "ignoring extra raw data candidate");
            continue;
        }
        let bytes = fs::read(&path).map_err(|e| SyncError::io(&path, e))?;
        match kind {
            ArtifactKind::RawData => {
                file.raw_data = bytes;
                raw_taken = true;
            }
            ArtifactKind::LuaScript => file.lua_script = bytes,
            ArtifactKind::StructuralData => file.structural_data = parse_map(&path, &bytes)?,
            ArtifactKind::MetaData => file.meta_data = parse_map(&path, &bytes)?,
        }
    }
    Ok(())
}

fn parse_map(path: &Path, bytes: &[u8]) -> SyncResult<StructuredMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(StructuredMap::new());
    }
    serde_json::from_slice(bytes).map_err(|e| SyncError::Artifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn list_entries(dir: &Path, want_dirs: bool) -> SyncResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| SyncError::io(entry.path(), e))?;
        if file_type.is_dir() != want_dirs {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 name");
            continue;
        };
        if !is_ignored_name(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn list_dirs(dir: &Path) -> SyncResult<Vec<String>> {
    list_entries(dir, true)
}

fn list_files(dir: &Path) -> SyncResult<Vec<String>> {
    list_entries(dir, false)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Materializes the store into a workspace directory.
#[derive(Clone)]
pub struct WorkspaceExporter {
    store: Arc<dyn DbManager>,
    root: PathBuf,
}

impl WorkspaceExporter {
    pub fn new(store: Arc<dyn DbManager>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    /// Write every bucket and file into the workspace.
    pub fn export_all(&self) -> SyncResult<ExportStats> {
        fs::create_dir_all(&self.root).map_err(|e| SyncError::io(&self.root, e))?;
        let mut stats = ExportStats::default();
        let mut names: HashMap<BucketId, String> = HashMap::new();

        self.store.each_bucket(&mut |bucket| {
            if !is_valid_name(&bucket.name) {
                warn!(bucket = %bucket.id, name = %bucket.name, "bucket name not exportable");
                stats.skipped += 1;
                return Ok(());
            }
            let dir = bucket_dir(&self.root, &bucket.name);
            fs::create_dir_all(&dir).map_err(|e| visitor_io(&dir, e))?;
            names.insert(bucket.id, bucket.name);
            stats.buckets += 1;
            Ok(())
        })?;

        self.store.each_file(&mut |file| {
            let Some(bucket_name) = names.get(&file.bucket_id) else {
                warn!(file = %file.id, bucket = %file.bucket_id, "file has no exported bucket");
                stats.skipped += 1;
                return Ok(());
            };
            if !is_valid_name(&file.name) {
                warn!(file = %file.id, name = %file.name, "file name not exportable");
                stats.skipped += 1;
                return Ok(());
            }
            write_file(&self.root, bucket_name, &file)
                .map_err(|e| StoreError::Visitor(e.to_string()))?;
            stats.files += 1;
            Ok(())
        })?;

        info!(
            root = %self.root.display(),
            buckets = stats.buckets,
            files = stats.files,
            skipped = stats.skipped,
            "workspace exported"
        );
        Ok(stats)
    }

    /// Write one file's non-empty facets into `<bucket>/<file>/`.
    pub fn export_file(&self, bucket_name: &str, file: &File) -> SyncResult<()> {
        if !is_valid_name(bucket_name) {
            return Err(SyncError::InvalidName(bucket_name.to_string()));
        }
        if !is_valid_name(&file.name) {
            return Err(SyncError::InvalidName(file.name.clone()));
        }
        write_file(&self.root, bucket_name, file)
    }
}

fn write_file(root: &Path, bucket_name: &str, file: &File) -> SyncResult<()> {
    let dir = file_dir(root, bucket_name, &file.name);
    fs::create_dir_all(&dir).map_err(|e| SyncError::io(&dir, e))?;

    let write = |kind: ArtifactKind, bytes: &[u8]| -> SyncResult<()> {
        let path = dir.join(kind.file_name(&file.name));
        fs::write(&path, bytes).map_err(|e| SyncError::io(&path, e))
    };

    if !file.raw_data.is_empty() {
        write(ArtifactKind::RawData, &file.raw_data)?;
    }
    if !file.lua_script.is_empty() {
        write(ArtifactKind::LuaScript, &file.lua_script)?;
    }
    if !file.structural_data.is_empty() {
        write(ArtifactKind::StructuralData, &pretty(&dir, &file.structural_data)?)?;
    }
    if !file.meta_data.is_empty() {
        write(ArtifactKind::MetaData, &pretty(&dir, &file.meta_data)?)?;
    }
    Ok(())
}

fn pretty(dir: &Path, map: &StructuredMap) -> SyncResult<Vec<u8>> {
    serde_json::to_vec_pretty(map).map_err(|e| SyncError::Artifact {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

fn visitor_io(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Visitor(format!("{}: {err}", path.display()))
}
