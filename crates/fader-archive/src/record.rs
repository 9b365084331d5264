//! Packed bucket and file records.
//!
//! Records are bincode-encoded and base64-wrapped, one per line. The two
//! structured maps travel as JSON bytes since their values are
//! self-describing.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use fader_types::{Bucket, BucketId, File, FileId, StructuredMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArchiveError, ArchiveResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedBucket {
    pub id: [u8; 16],
    pub name: String,
    pub owners: Vec<[u8; 16]>,
    pub lua_script: Vec<u8>,
    pub meta_data: Vec<u8>,
    pub structural_data: Vec<u8>,
    pub raw_data: Vec<u8>,
    pub file_store_name: String,
    pub meta_store_name: String,
    pub structural_store_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PackedBucket {
    pub fn pack(bucket: &Bucket) -> ArchiveResult<Self> {
        Ok(Self {
            id: *bucket.id.as_bytes(),
            name: bucket.name.clone(),
            owners: bucket.owners.iter().map(|o| *o.as_bytes()).collect(),
            lua_script: bucket.lua_script.clone(),
            meta_data: map_to_json(&bucket.meta_data)?,
            structural_data: map_to_json(&bucket.structural_data)?,
            raw_data: bucket.raw_data.clone(),
            file_store_name: bucket.file_store_name.clone(),
            meta_store_name: bucket.meta_store_name.clone(),
            structural_store_name: bucket.structural_store_name.clone(),
            created_at: bucket.created_at,
            updated_at: bucket.updated_at,
        })
    }

    pub fn unpack(self, line: usize) -> ArchiveResult<Bucket> {
        Ok(Bucket {
            id: BucketId::from_uuid(Uuid::from_bytes(self.id)),
            name: self.name,
            owners: self.owners.into_iter().map(Uuid::from_bytes).collect(),
            lua_script: self.lua_script,
            meta_data: map_from_json(&self.meta_data, line)?,
            structural_data: map_from_json(&self.structural_data, line)?,
            raw_data: self.raw_data,
            file_store_name: self.file_store_name,
            meta_store_name: self.meta_store_name,
            structural_store_name: self.structural_store_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedFile {
    pub id: [u8; 16],
    pub bucket_id: [u8; 16],
    pub name: String,
    pub lua_script: Vec<u8>,
    pub content_type: String,
    pub owners: Vec<[u8; 16]>,
    pub is_private: bool,
    pub is_read_only: bool,
    pub meta_data: Vec<u8>,
    pub structural_data: Vec<u8>,
    pub raw_data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PackedFile {
    pub fn pack(file: &File) -> ArchiveResult<Self> {
        Ok(Self {
            id: *file.id.as_bytes(),
            bucket_id: *file.bucket_id.as_bytes(),
            name: file.name.clone(),
            lua_script: file.lua_script.clone(),
            content_type: file.content_type.clone(),
            owners: file.owners.iter().map(|o| *o.as_bytes()).collect(),
            is_private: file.is_private,
            is_read_only: file.is_read_only,
            meta_data: map_to_json(&file.meta_data)?,
            structural_data: map_to_json(&file.structural_data)?,
            raw_data: file.raw_data.clone(),
            created_at: file.created_at,
            updated_at: file.updated_at,
        })
    }

    pub fn unpack(self, line: usize) -> ArchiveResult<File> {
        Ok(File {
            id: FileId::from_uuid(Uuid::from_bytes(self.id)),
            bucket_id: BucketId::from_uuid(Uuid::from_bytes(self.bucket_id)),
            name: self.name,
            lua_script: self.lua_script,
            content_type: self.content_type,
            owners: self.owners.into_iter().map(Uuid::from_bytes).collect(),
            is_private: self.is_private,
            is_read_only: self.is_read_only,
            meta_data: map_from_json(&self.meta_data, line)?,
            structural_data: map_from_json(&self.structural_data, line)?,
            raw_data: self.raw_data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// bincode, then base64.
pub fn encode_line<T: Serialize>(record: &T) -> ArchiveResult<String> {
    let bytes = bincode::serialize(record).map_err(|e| ArchiveError::Encode(e.to_string()))?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Inverse of [`encode_line`]. `line` is the 1-based line number for errors.
pub fn decode_line<T: DeserializeOwned>(text: &str, line: usize) -> ArchiveResult<T> {
    let bytes = general_purpose::STANDARD
        .decode(text)
        .map_err(|source| ArchiveError::Base64 { line, source })?;
    bincode::deserialize(&bytes).map_err(|e| ArchiveError::Record {
        line,
        reason: e.to_string(),
    })
}

fn map_to_json(map: &StructuredMap) -> ArchiveResult<Vec<u8>> {
    if map.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::to_vec(map).map_err(|e| ArchiveError::Encode(e.to_string()))
}

fn map_from_json(bytes: &[u8], line: usize) -> ArchiveResult<StructuredMap> {
    if bytes.is_empty() {
        return Ok(StructuredMap::new());
    }
    serde_json::from_slice(bytes).map_err(|e| ArchiveError::Record {
        line,
        reason: format!("structured map: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_record_keeps_every_field() {
        let mut file = File::new(BucketId::new(), "report.pdf");
        file.raw_data = vec![0, 159, 146, 150];
        file.content_type = "application/pdf".into();
        file.owners.insert(Uuid::new_v4());
        file.is_private = true;
        file.meta_data.insert("pages".into(), json!(12));
        file.structural_data.insert("toc".into(), json!([{"h": 1}]));
        file.created_at = Utc::now();
        file.updated_at = file.created_at;

        let line = encode_line(&PackedFile::pack(&file).unwrap()).unwrap();
        assert!(!line.contains('\n'));
        let back = decode_line::<PackedFile>(&line, 3).unwrap().unpack(3).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn truncated_record_reports_its_line() {
        let bucket = Bucket::new("b");
        let line = encode_line(&PackedBucket::pack(&bucket).unwrap()).unwrap();
        let truncated = general_purpose::STANDARD.encode(
            &general_purpose::STANDARD.decode(&line).unwrap()[..4],
        );
        let err = decode_line::<PackedBucket>(&truncated, 7).unwrap_err();
        assert!(matches!(err, ArchiveError::Record { line: 7, .. }));
    }

    #[test]
    fn garbage_is_a_base64_error() {
        let err = decode_line::<PackedBucket>("not base64!", 2).unwrap_err();
        assert!(matches!(err, ArchiveError::Base64 { line: 2, .. }));
    }
}
