//! Composite key layout.
//!
//! Entity rows are keyed by `[16-byte ID | 1-byte field tag]`, so all of an
//! entity's fields share a prefix and can be read or written independently.
//! Secondary indices are keyed by a 32-byte domain-separated BLAKE3 hash of
//! the natural key.

use fader_types::{BucketId, FileId};

use crate::error::{StoreError, StoreResult};

/// Length of a raw entity ID.
pub const ID_LEN: usize = 16;
/// Length of an entity row key.
pub const KEY_LEN: usize = ID_LEN + 1;
/// Length of a secondary index key.
pub const INDEX_KEY_LEN: usize = 32;

const BUCKET_NAME_DOMAIN: &[u8] = b"fader-bucket-name-v1:";
const FILE_NAME_DOMAIN: &[u8] = b"fader-file-name-v1:";

/// Build the row key for one field of an entity.
pub fn entity_key(id: &[u8; ID_LEN], tag: u8) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..ID_LEN].copy_from_slice(id);
    key[ID_LEN] = tag;
    key
}

/// Split a row key back into `(id, tag)`. Returns `None` on a malformed key.
pub fn split_key(key: &[u8]) -> Option<([u8; ID_LEN], u8)> {
    if key.len() != KEY_LEN {
        return None;
    }
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(&key[..ID_LEN]);
    Some((id, key[ID_LEN]))
}

/// Index key for a bucket name.
pub fn bucket_name_key(name: &str) -> [u8; INDEX_KEY_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(BUCKET_NAME_DOMAIN);
    hasher.update(name.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Index key for a file name within its bucket.
pub fn file_name_key(bucket: &BucketId, name: &str) -> [u8; INDEX_KEY_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(FILE_NAME_DOMAIN);
    hasher.update(bucket.as_bytes());
    hasher.update(name.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Index value for a file: the owning bucket ID followed by the file ID.
pub fn file_index_value(bucket: &BucketId, file: &FileId) -> [u8; 2 * ID_LEN] {
    let mut value = [0u8; 2 * ID_LEN];
    value[..ID_LEN].copy_from_slice(bucket.as_bytes());
    value[ID_LEN..].copy_from_slice(file.as_bytes());
    value
}

/// Decode a file index value produced by [`file_index_value`].
pub fn split_file_index_value(value: &[u8]) -> StoreResult<(BucketId, FileId)> {
    if value.len() != 2 * ID_LEN {
        return Err(StoreError::Decode {
            field: "file_names",
            reason: format!("expected {} bytes, got {}", 2 * ID_LEN, value.len()),
        });
    }
    let bucket = BucketId::from_slice(&value[..ID_LEN]).map_err(decode_index)?;
    let file = FileId::from_slice(&value[ID_LEN..]).map_err(decode_index)?;
    Ok((bucket, file))
}

fn decode_index(err: fader_types::TypeError) -> StoreError {
    StoreError::Decode {
        field: "file_names",
        reason: err.to_string(),
    }
}
