use std::sync::Arc;

use fader_store::{
    BucketImportManager, BucketManager, DbManager, FileImportManager, FileManager, StoreError,
};
use fader_types::{Bucket, DataUsed, File, ImportPolicy};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, ArchiveResult};
use crate::info::{ArchiveInfoLine, BUCKETS_END};
use crate::record::{decode_line, encode_line, PackedBucket, PackedFile};

/// What an import did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// The info line, when one was readable.
    pub info: Option<ArchiveInfoLine>,
    pub buckets_applied: usize,
    pub files_applied: usize,
    /// Lines that could not be decoded or applied.
    pub skipped: usize,
}

impl ImportReport {
    pub fn applied(&self) -> usize {
        self.buckets_applied + self.files_applied
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Info,
    Buckets,
    Files,
}

/// Exports a whole store to the archive format and imports it back.
pub struct Archive {
    store: Arc<dyn DbManager>,
    policy: ImportPolicy,
}

impl Archive {
    pub fn new(store: Arc<dyn DbManager>, policy: ImportPolicy) -> Self {
        Self { store, policy }
    }

    /// Write every bucket, the sentinel, then every file.
    pub fn export(&self, version: &str, author: &str, description: &str) -> ArchiveResult<Vec<u8>> {
        let info = ArchiveInfoLine::new(version, author, description);
        let mut out = info.to_line()?;
        out.push('\n');

        let mut failure = None;
        let mut buckets = 0usize;
        let scan = self.store.each_bucket(&mut |bucket| {
            let line = PackedBucket::pack(&bucket).and_then(|r| encode_line(&r));
            push_record(&mut out, line, &mut failure)?;
            buckets += 1;
            Ok(())
        });
        finish_scan(scan, &mut failure)?;

        out.push_str(BUCKETS_END);
        out.push('\n');

        let mut files = 0usize;
        let scan = self.store.each_file(&mut |file| {
            let line = PackedFile::pack(&file).and_then(|r| encode_line(&r));
            push_record(&mut out, line, &mut failure)?;
            files += 1;
            Ok(())
        });
        finish_scan(scan, &mut failure)?;

        info!(buckets, files, bytes = out.len(), version, author, "archive exported");
        Ok(out.into_bytes())
    }

    /// Import an archive and return its info line.
    ///
    /// In best-effort mode bad lines are logged and skipped, so a successful
    /// return does not mean every record was applied; use
    /// [`import_with_report`](Self::import_with_report) to check counts.
    pub fn import(&self, data: &[u8]) -> ArchiveResult<ArchiveInfoLine> {
        self.import_with_report(data)?
            .info
            .ok_or(ArchiveError::MissingInfo)
    }

    /// Import an archive, reporting what was applied and skipped.
    ///
    /// Records that already exist by ID are updated with a full projection,
    /// everything else is created. Nothing is rolled back on failure.
    pub fn import_with_report(&self, data: &[u8]) -> ArchiveResult<ImportReport> {
        let text = String::from_utf8_lossy(data);
        let mut report = ImportReport::default();
        let mut phase = Phase::Info;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if raw == BUCKETS_END {
                if phase == Phase::Info {
                    self.tolerate(&mut report, line, ArchiveError::MissingInfo)?;
                }
                phase = Phase::Files;
                continue;
            }

            let step = match phase {
                Phase::Info => {
                    phase = Phase::Buckets;
                    ArchiveInfoLine::parse(raw).map(|info| {
                        debug!(version = %info.version, author = %info.author, "archive info");
                        report.info = Some(info);
                    })
                }
                Phase::Buckets => decode_line::<PackedBucket>(raw, line)
                    .and_then(|r| r.unpack(line))
                    .and_then(|bucket| self.apply_bucket(bucket))
                    .map(|()| report.buckets_applied += 1),
                Phase::Files => decode_line::<PackedFile>(raw, line)
                    .and_then(|r| r.unpack(line))
                    .and_then(|file| self.apply_file(file))
                    .map(|()| report.files_applied += 1),
            };
            if let Err(e) = step {
                self.tolerate(&mut report, line, e)?;
            }
        }

        info!(
            buckets = report.buckets_applied,
            files = report.files_applied,
            skipped = report.skipped,
            "archive imported"
        );
        Ok(report)
    }

    fn tolerate(&self, report: &mut ImportReport, line: usize, err: ArchiveError) -> ArchiveResult<()> {
        if self.policy.is_strict() {
            return Err(err);
        }
        warn!(line, error = %err, "skipping archive line");
        report.skipped += 1;
        Ok(())
    }

    fn apply_bucket(&self, mut bucket: Bucket) -> ArchiveResult<()> {
        match self.store.find_bucket(&bucket.id, DataUsed::PRIMARY_IDS) {
            Ok(_) => self.store.update_bucket(&mut bucket, DataUsed::FULL_BUCKET)?,
            Err(e) if e.is_not_found() => self.store.create_bucket(&mut bucket)?,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn apply_file(&self, mut file: File) -> ArchiveResult<()> {
        match self.store.find_file(&file.id, DataUsed::PRIMARY_IDS) {
            Ok(_) => self.store.update_file_from(&mut file, DataUsed::FULL_FILE)?,
            Err(e) if e.is_not_found() => self.store.create_file(&mut file)?,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive").field("policy", &self.policy).finish()
    }
}

/// Append an encoded record, or stash the error and abort the scan.
fn push_record(
    out: &mut String,
    line: ArchiveResult<String>,
    failure: &mut Option<ArchiveError>,
) -> Result<(), StoreError> {
    match line {
        Ok(line) => {
            out.push_str(&line);
            out.push('\n');
            Ok(())
        }
        Err(e) => {
            *failure = Some(e);
            Err(StoreError::Visitor("archive encoding failed".to_string()))
        }
    }
}

fn finish_scan(scan: Result<(), StoreError>, failure: &mut Option<ArchiveError>) -> ArchiveResult<()> {
    match (scan, failure.take()) {
        (_, Some(e)) => Err(e),
        (Err(e), None) => Err(e.into()),
        (Ok(()), None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};
    use fader_store::RedbStore;

    fn store() -> Arc<dyn DbManager> {
        Arc::new(RedbStore::in_memory().unwrap())
    }

    fn seeded() -> Arc<dyn DbManager> {
        let store = store();
        let mut bucket = Bucket::new("b");
        store.create_bucket(&mut bucket).unwrap();
        let mut file = File::new(bucket.id, "f");
        file.raw_data = b"payload".to_vec();
        store.create_file(&mut file).unwrap();
        store
    }

    #[test]
    fn layout_is_info_buckets_sentinel_files() {
        let data = Archive::new(seeded(), ImportPolicy::Strict)
            .export("1", "me", "test")
            .unwrap();
        let text = String::from_utf8(data).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], BUCKETS_END);
        assert_eq!(ArchiveInfoLine::parse(lines[0]).unwrap().author, "me");
    }

    #[test]
    fn invalid_info_field_fails_export() {
        let err = Archive::new(seeded(), ImportPolicy::Strict)
            .export("1", "me", "a|b")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidInfoField { field: "description" }));
    }

    #[test]
    fn reimport_updates_in_place() {
        let source = seeded();
        let data = Archive::new(Arc::clone(&source), ImportPolicy::Strict)
            .export("1", "me", "")
            .unwrap();

        let report = Archive::new(Arc::clone(&source), ImportPolicy::Strict)
            .import_with_report(&data)
            .unwrap();
        assert_eq!((report.buckets_applied, report.files_applied), (1, 1));
        assert_eq!(source.count_buckets().unwrap(), 1);
    }

    #[test]
    fn bad_lines_are_skipped_in_best_effort() {
        let data = Archive::new(seeded(), ImportPolicy::Strict)
            .export("1", "me", "")
            .unwrap();
        let mut text = String::from_utf8(data).unwrap();
        text.push_str("!!not base64!!\n");
        text.push_str(&general_purpose::STANDARD.encode(b"short"));
        text.push('\n');

        let target = store();
        let report = Archive::new(Arc::clone(&target), ImportPolicy::BestEffort)
            .import_with_report(text.as_bytes())
            .unwrap();
        assert_eq!(report.applied(), 2);
        assert_eq!(report.skipped, 2);
        assert!(report.info.is_some());

        let err = Archive::new(store(), ImportPolicy::Strict)
            .import(text.as_bytes())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Base64 { .. }));
    }

    #[test]
    fn foreign_info_line_is_skipped() {
        let data = Archive::new(seeded(), ImportPolicy::Strict)
            .export("1", "me", "")
            .unwrap();
        let text = String::from_utf8(data).unwrap();
        let foreign = general_purpose::STANDARD.encode("other|1|x|2024-01-01T00:00:00Z|");
        let body: Vec<&str> = text.lines().skip(1).collect();
        let rewritten = format!("{foreign}\n{}\n", body.join("\n"));

        let archive = Archive::new(store(), ImportPolicy::BestEffort);
        let report = archive.import_with_report(rewritten.as_bytes()).unwrap();
        assert!(report.info.is_none());
        assert_eq!(report.applied(), 2);
        assert!(matches!(
            archive.import(rewritten.as_bytes()),
            Err(ArchiveError::MissingInfo)
        ));
    }

    #[test]
    fn empty_input_has_no_info() {
        let archive = Archive::new(store(), ImportPolicy::BestEffort);
        assert!(matches!(archive.import(b""), Err(ArchiveError::MissingInfo)));
    }
}
