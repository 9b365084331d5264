use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{BucketId, FileId};
use crate::StructuredMap;

/// A named item within a bucket.
///
/// A file carries four independent content facets: the raw payload, the
/// script, structural data and meta data. `(bucket_id, name)` is unique.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Immutable primary key.
    pub id: FileId,
    /// Owning bucket. Referential integrity is by convention only.
    pub bucket_id: BucketId,
    /// Unique within the owning bucket.
    pub name: String,
    pub lua_script: Vec<u8>,
    pub content_type: String,
    pub owners: BTreeSet<Uuid>,
    pub is_private: bool,
    pub is_read_only: bool,
    pub meta_data: StructuredMap,
    pub structural_data: StructuredMap,
    pub raw_data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// A file with a fresh random ID inside `bucket_id`; all facets empty.
    pub fn new(bucket_id: BucketId, name: impl Into<String>) -> Self {
        Self {
            id: FileId::new(),
            bucket_id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Clear the four workspace-mirrored content facets.
    pub fn clear_artifacts(&mut self) {
        self.lua_script.clear();
        self.meta_data.clear();
        self.structural_data.clear();
        self.raw_data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_belongs_to_bucket() {
        let bucket = BucketId::new();
        let f = File::new(bucket, "index.html");
        assert_eq!(f.bucket_id, bucket);
        assert!(!f.id.is_nil());
        assert!(!f.is_private);
    }

    #[test]
    fn clear_artifacts_keeps_identity() {
        let mut f = File::new(BucketId::new(), "a");
        f.raw_data = b"payload".to_vec();
        f.lua_script = b"return 1".to_vec();
        f.meta_data.insert("k".into(), serde_json::json!(1));
        f.content_type = "text/plain".into();
        f.clear_artifacts();
        assert!(f.raw_data.is_empty());
        assert!(f.lua_script.is_empty());
        assert!(f.meta_data.is_empty());
        assert_eq!(f.name, "a");
        assert_eq!(f.content_type, "text/plain");
    }
}
