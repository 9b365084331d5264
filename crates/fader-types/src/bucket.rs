use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::BucketId;
use crate::StructuredMap;

/// A named collection of files.
///
/// Every field except the timestamps is independently addressable through a
/// [`DataUsed`](crate::DataUsed) projection. Fields that were not requested
/// on a read stay at their zero value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Immutable primary key.
    pub id: BucketId,
    /// Globally unique name.
    pub name: String,
    pub owners: BTreeSet<Uuid>,
    /// Opaque script payload. Never executed by the store.
    pub lua_script: Vec<u8>,
    pub meta_data: StructuredMap,
    pub structural_data: StructuredMap,
    pub raw_data: Vec<u8>,
    pub file_store_name: String,
    pub meta_store_name: String,
    pub structural_store_name: String,
    /// Set once by the store on creation.
    pub created_at: DateTime<Utc>,
    /// Rewritten by the store on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl Bucket {
    /// A bucket with a fresh random ID and the given name; all facets empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: BucketId::new(),
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bucket_has_id_and_empty_facets() {
        let b = Bucket::new("photos");
        assert!(!b.id.is_nil());
        assert_eq!(b.name, "photos");
        assert!(b.raw_data.is_empty());
        assert!(b.meta_data.is_empty());
        assert!(b.owners.is_empty());
    }
}
