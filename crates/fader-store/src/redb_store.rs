use std::fmt;
use std::path::Path;

use fader_types::{Bucket, BucketId, DataUsed, File, FileId};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, Table, TableDefinition};
use tracing::debug;

use crate::codec::now;
use crate::error::{StoreError, StoreResult};
use crate::field::{BucketField, EntityField, FileField};
use crate::key::{
    bucket_name_key, entity_key, file_index_value, file_name_key, split_file_index_value,
    split_key, ID_LEN,
};
use crate::traits::{BucketImportManager, BucketManager, DbManager, FileImportManager, FileManager};

type Rows = TableDefinition<'static, &'static [u8], &'static [u8]>;
type RowTable<'txn> = Table<'txn, &'static [u8], &'static [u8]>;

const BUCKETS: Rows = TableDefinition::new("buckets");
const FILES: Rows = TableDefinition::new("files");
const BUCKET_NAMES: Rows = TableDefinition::new("bucket_names");
const FILE_NAMES: Rows = TableDefinition::new("file_names");

/// Store backed by a redb database.
///
/// redb serializes writers and gives readers a consistent snapshot, so each
/// operation here is atomic on its own. Nothing spans multiple operations.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "store opened");
        Self::with_database(db)
    }

    /// A volatile store for tests and embedding.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::with_database(db)
    }

    fn with_database(db: Database) -> StoreResult<Self> {
        let txn = db.begin_write()?;
        for table in [BUCKETS, FILES, BUCKET_NAMES, FILE_NAMES] {
            txn.open_table(table)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// IDs of every entity in `table`, in key order.
    fn primary_ids<F: EntityField>(&self, table: Rows) -> StoreResult<Vec<[u8; ID_LEN]>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        let mut ids = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            if let Some((id, tag)) = split_key(key.value()) {
                if tag == F::PRIMARY.tag() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

impl fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn exists<F, T>(table: &T, id: &[u8; ID_LEN]) -> StoreResult<bool>
where
    F: EntityField,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let key = entity_key(id, F::PRIMARY.tag());
    Ok(table.get(&key[..])?.is_some())
}

/// Decode the rows selected by `projection`. Missing rows leave the field at
/// its current value; a decode failure aborts the whole read.
fn read_fields<F, T>(
    table: &T,
    id: &[u8; ID_LEN],
    entity: &mut F::Entity,
    projection: DataUsed,
) -> StoreResult<()>
where
    F: EntityField,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    for field in F::read_by(projection) {
        let key = entity_key(id, field.tag());
        if let Some(guard) = table.get(&key[..])? {
            field.decode(entity, guard.value())?;
        }
    }
    Ok(())
}

fn write_field<F: EntityField>(
    table: &mut RowTable<'_>,
    id: &[u8; ID_LEN],
    entity: &F::Entity,
    field: F,
) -> StoreResult<()> {
    let key = entity_key(id, field.tag());
    let value = field.encode(entity)?;
    table.insert(&key[..], value.as_slice())?;
    Ok(())
}

fn write_fields<F: EntityField>(
    table: &mut RowTable<'_>,
    id: &[u8; ID_LEN],
    entity: &F::Entity,
    projection: DataUsed,
) -> StoreResult<()> {
    for field in F::written_by(projection) {
        write_field(table, id, entity, field)?;
    }
    Ok(())
}

fn index_entry<T>(table: &T, key: &[u8]) -> StoreResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
}

fn read_bucket<T>(table: &T, id: &BucketId, projection: DataUsed) -> StoreResult<Bucket>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if !exists::<BucketField, _>(table, id.as_bytes())? {
        return Err(StoreError::BucketNotFound(id.to_string()));
    }
    let mut bucket = Bucket {
        id: *id,
        ..Default::default()
    };
    read_fields::<BucketField, _>(table, id.as_bytes(), &mut bucket, projection)?;
    Ok(bucket)
}

fn read_file<T>(table: &T, id: &FileId, projection: DataUsed) -> StoreResult<File>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if !exists::<FileField, _>(table, id.as_bytes())? {
        return Err(StoreError::FileNotFound(id.to_string()));
    }
    let mut file = File {
        id: *id,
        ..Default::default()
    };
    read_fields::<FileField, _>(table, id.as_bytes(), &mut file, projection)?;
    Ok(file)
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

impl BucketManager for RedbStore {
    fn find_bucket(&self, id: &BucketId, projection: DataUsed) -> StoreResult<Bucket> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BUCKETS)?;
        read_bucket(&table, id, projection)
    }

    fn find_bucket_by_name(&self, name: &str, projection: DataUsed) -> StoreResult<Bucket> {
        let txn = self.db.begin_read()?;
        let names = txn.open_table(BUCKET_NAMES)?;
        let raw = index_entry(&names, &bucket_name_key(name))?
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))?;
        let id = BucketId::from_slice(&raw).map_err(|e| StoreError::Decode {
            field: "bucket_names",
            reason: e.to_string(),
        })?;
        let table = txn.open_table(BUCKETS)?;
        read_bucket(&table, &id, projection)
    }

    fn create_bucket_from(&self, bucket: &mut Bucket, projection: DataUsed) -> StoreResult<()> {
        if bucket.id.is_nil() {
            return Err(StoreError::NilId("bucket"));
        }
        let id = *bucket.id.as_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(BUCKETS)?;
            let mut names = txn.open_table(BUCKET_NAMES)?;

            if exists::<BucketField, _>(&table, &id)? {
                return Err(StoreError::AlreadyExists {
                    kind: "bucket",
                    key: bucket.id.to_string(),
                });
            }

            if projection.contains(DataUsed::PRIMARY_NAMES) {
                let name_key = bucket_name_key(&bucket.name);
                if index_entry(&names, &name_key)?.is_some_and(|owner| owner != id) {
                    return Err(StoreError::AlreadyExists {
                        kind: "bucket",
                        key: bucket.name.clone(),
                    });
                }
                names.insert(&name_key[..], &id[..])?;
            }

            let stamp = now();
            bucket.created_at = stamp;
            bucket.updated_at = stamp;
            write_fields::<BucketField>(&mut table, &id, bucket, projection | DataUsed::PRIMARY_IDS)?;
            write_field(&mut table, &id, bucket, BucketField::CreatedAt)?;
            write_field(&mut table, &id, bucket, BucketField::UpdatedAt)?;
        }
        txn.commit()?;

        debug!(bucket = %bucket.id, name = %bucket.name, ?projection, "bucket created");
        Ok(())
    }

    fn update_bucket(&self, bucket: &mut Bucket, projection: DataUsed) -> StoreResult<()> {
        if bucket.id.is_nil() {
            return Err(StoreError::NilId("bucket"));
        }
        let id = *bucket.id.as_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(BUCKETS)?;
            let mut names = txn.open_table(BUCKET_NAMES)?;

            let previous = read_bucket(&table, &bucket.id, DataUsed::PRIMARY_NAMES)?;

            if projection.contains(DataUsed::PRIMARY_NAMES) {
                let old_key = bucket_name_key(&previous.name);
                let new_key = bucket_name_key(&bucket.name);
                if index_entry(&names, &new_key)?.is_some_and(|owner| owner != id) {
                    return Err(StoreError::AlreadyExists {
                        kind: "bucket",
                        key: bucket.name.clone(),
                    });
                }
                if index_entry(&names, &old_key)?.is_some_and(|owner| owner == id) {
                    names.remove(&old_key[..])?;
                }
                names.insert(&new_key[..], &id[..])?;
            }

            bucket.created_at = previous.created_at;
            bucket.updated_at = now();
            write_fields::<BucketField>(&mut table, &id, bucket, projection)?;
            write_field(&mut table, &id, bucket, BucketField::UpdatedAt)?;
        }
        txn.commit()?;

        debug!(bucket = %bucket.id, ?projection, "bucket updated");
        Ok(())
    }
}

impl BucketImportManager for RedbStore {
    fn each_bucket(&self, visitor: &mut dyn FnMut(Bucket) -> StoreResult<()>) -> StoreResult<()> {
        for raw in self.primary_ids::<BucketField>(BUCKETS)? {
            let id = BucketId::from_slice(&raw).map_err(|e| StoreError::Decode {
                field: "bucket_id",
                reason: e.to_string(),
            })?;
            let bucket = self.find_bucket(&id, DataUsed::FULL_BUCKET)?;
            visitor(bucket)?;
        }
        Ok(())
    }

    fn count_buckets(&self) -> StoreResult<usize> {
        Ok(self.primary_ids::<BucketField>(BUCKETS)?.len())
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

impl FileManager for RedbStore {
    fn find_file(&self, id: &FileId, projection: DataUsed) -> StoreResult<File> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        read_file(&table, id, projection)
    }

    fn find_file_by_name(
        &self,
        bucket: &BucketId,
        name: &str,
        projection: DataUsed,
    ) -> StoreResult<File> {
        let txn = self.db.begin_read()?;
        let names = txn.open_table(FILE_NAMES)?;
        let raw = index_entry(&names, &file_name_key(bucket, name))?
            .ok_or_else(|| StoreError::FileNotFound(format!("{bucket}/{name}")))?;
        let (_, file_id) = split_file_index_value(&raw)?;
        let table = txn.open_table(FILES)?;
        read_file(&table, &file_id, projection)
    }

    fn create_file_from(&self, file: &mut File, projection: DataUsed) -> StoreResult<()> {
        if file.id.is_nil() {
            return Err(StoreError::NilId("file"));
        }
        if file.bucket_id.is_nil() {
            return Err(StoreError::NilId("owning bucket"));
        }
        let id = *file.id.as_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FILES)?;
            let mut names = txn.open_table(FILE_NAMES)?;

            if exists::<FileField, _>(&table, &id)? {
                return Err(StoreError::AlreadyExists {
                    kind: "file",
                    key: file.id.to_string(),
                });
            }

            if projection.contains(DataUsed::PRIMARY_NAMES) {
                let name_key = file_name_key(&file.bucket_id, &file.name);
                let value = file_index_value(&file.bucket_id, &file.id);
                if index_entry(&names, &name_key)?.is_some_and(|owner| owner != value) {
                    return Err(StoreError::AlreadyExists {
                        kind: "file",
                        key: format!("{}/{}", file.bucket_id, file.name),
                    });
                }
                names.insert(&name_key[..], &value[..])?;
            }

            let stamp = now();
            file.created_at = stamp;
            file.updated_at = stamp;
            write_fields::<FileField>(&mut table, &id, file, projection | DataUsed::PRIMARY_IDS)?;
            write_field(&mut table, &id, file, FileField::CreatedAt)?;
            write_field(&mut table, &id, file, FileField::UpdatedAt)?;
        }
        txn.commit()?;

        debug!(file = %file.id, bucket = %file.bucket_id, name = %file.name, ?projection, "file created");
        Ok(())
    }

    fn update_file_from(&self, file: &mut File, projection: DataUsed) -> StoreResult<()> {
        if file.id.is_nil() {
            return Err(StoreError::NilId("file"));
        }
        if projection.contains(DataUsed::PRIMARY_IDS) && file.bucket_id.is_nil() {
            return Err(StoreError::NilId("owning bucket"));
        }
        let id = *file.id.as_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FILES)?;
            let mut names = txn.open_table(FILE_NAMES)?;

            let previous = read_file(
                &table,
                &file.id,
                DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES,
            )?;

            if projection.intersects(DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES) {
                let bucket = if projection.contains(DataUsed::PRIMARY_IDS) {
                    file.bucket_id
                } else {
                    previous.bucket_id
                };
                let name = if projection.contains(DataUsed::PRIMARY_NAMES) {
                    file.name.as_str()
                } else {
                    previous.name.as_str()
                };
                let old_key = file_name_key(&previous.bucket_id, &previous.name);
                let new_key = file_name_key(&bucket, name);
                let value = file_index_value(&bucket, &file.id);
                let old_value = file_index_value(&previous.bucket_id, &file.id);

                if index_entry(&names, &new_key)?
                    .is_some_and(|owner| owner[ID_LEN..] != id[..])
                {
                    return Err(StoreError::AlreadyExists {
                        kind: "file",
                        key: format!("{bucket}/{name}"),
                    });
                }
                if index_entry(&names, &old_key)?.is_some_and(|owner| owner == old_value) {
                    names.remove(&old_key[..])?;
                }
                names.insert(&new_key[..], &value[..])?;
            }

            file.created_at = previous.created_at;
            file.updated_at = now();
            write_fields::<FileField>(&mut table, &id, file, projection)?;
            write_field(&mut table, &id, file, FileField::UpdatedAt)?;
        }
        txn.commit()?;

        debug!(file = %file.id, ?projection, "file updated");
        Ok(())
    }

    fn delete_file(&self, id: &FileId) -> StoreResult<()> {
        let raw_id = *id.as_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FILES)?;
            let mut names = txn.open_table(FILE_NAMES)?;

            let previous =
                read_file(&table, id, DataUsed::PRIMARY_IDS | DataUsed::PRIMARY_NAMES)?;

            for field in FileField::ALL {
                let key = entity_key(&raw_id, field.tag());
                table.remove(&key[..])?;
            }

            let name_key = file_name_key(&previous.bucket_id, &previous.name);
            let value = file_index_value(&previous.bucket_id, id);
            if index_entry(&names, &name_key)?.is_some_and(|owner| owner == value) {
                names.remove(&name_key[..])?;
            }
        }
        txn.commit()?;

        debug!(file = %id, "file deleted");
        Ok(())
    }
}

impl FileImportManager for RedbStore {
    fn each_file(&self, visitor: &mut dyn FnMut(File) -> StoreResult<()>) -> StoreResult<()> {
        for raw in self.primary_ids::<FileField>(FILES)? {
            let id = FileId::from_slice(&raw).map_err(|e| StoreError::Decode {
                field: "file_id",
                reason: e.to_string(),
            })?;
            // A file deleted after the ID scan is simply skipped.
            let file = match self.find_file(&id, DataUsed::FULL_FILE) {
                Ok(file) => file,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            visitor(file)?;
        }
        Ok(())
    }
}

impl DbManager for RedbStore {}
