use fader_types::{Bucket, BucketId, DataUsed, File, FileId};

use crate::error::StoreResult;

/// Bucket CRUD with projected reads and writes.
///
/// There is no bucket deletion.
pub trait BucketManager: Send + Sync {
    /// Read the fields selected by `projection`. Fails with `BucketNotFound`
    /// when no bucket has this ID.
    fn find_bucket(&self, id: &BucketId, projection: DataUsed) -> StoreResult<Bucket>;

    /// Resolve `name` through the name index, then read as [`find_bucket`](Self::find_bucket).
    fn find_bucket_by_name(&self, name: &str, projection: DataUsed) -> StoreResult<Bucket>;

    /// Create a bucket with every field.
    fn create_bucket(&self, bucket: &mut Bucket) -> StoreResult<()> {
        self.create_bucket_from(bucket, DataUsed::FULL_BUCKET)
    }

    /// Create a bucket writing only the fields in `projection`.
    ///
    /// The ID row is always written. Sets both timestamps on `bucket`.
    fn create_bucket_from(&self, bucket: &mut Bucket, projection: DataUsed) -> StoreResult<()>;

    /// Rewrite the fields in `projection` of an existing bucket and refresh
    /// `updated_at`. Untouched fields keep their stored values.
    fn update_bucket(&self, bucket: &mut Bucket, projection: DataUsed) -> StoreResult<()>;
}

/// File CRUD with projected reads and writes.
pub trait FileManager: Send + Sync {
    fn find_file(&self, id: &FileId, projection: DataUsed) -> StoreResult<File>;

    /// Resolve `(bucket, name)` through the name index, then read as [`find_file`](Self::find_file).
    fn find_file_by_name(
        &self,
        bucket: &BucketId,
        name: &str,
        projection: DataUsed,
    ) -> StoreResult<File>;

    fn create_file(&self, file: &mut File) -> StoreResult<()> {
        self.create_file_from(file, DataUsed::FULL_FILE)
    }

    fn create_file_from(&self, file: &mut File, projection: DataUsed) -> StoreResult<()>;

    fn update_file_from(&self, file: &mut File, projection: DataUsed) -> StoreResult<()>;

    /// Remove every field row and the name index entry of a file.
    fn delete_file(&self, id: &FileId) -> StoreResult<()>;
}

/// Full scans over buckets.
pub trait BucketImportManager: Send + Sync {
    /// Visit every bucket with a full projection. A visitor error aborts the
    /// scan and is returned.
    fn each_bucket(&self, visitor: &mut dyn FnMut(Bucket) -> StoreResult<()>) -> StoreResult<()>;

    /// Number of stored buckets.
    fn count_buckets(&self) -> StoreResult<usize>;
}

/// Full scans over files.
pub trait FileImportManager: Send + Sync {
    /// Visit every file with a full projection. A visitor error aborts the
    /// scan and is returned.
    fn each_file(&self, visitor: &mut dyn FnMut(File) -> StoreResult<()>) -> StoreResult<()>;
}

/// The complete store capability consumed by the synchronizer, the archive
/// codec and external collaborators.
pub trait DbManager: BucketManager + FileManager + BucketImportManager + FileImportManager {}
