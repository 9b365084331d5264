//! Field tables.
//!
//! Each persisted field of an entity is one variant of a closed enum. The
//! variant carries its row tag, the projection bit that selects it, and its
//! encode/decode arms, so adding a field is one variant plus its arms here.

use fader_types::{Bucket, BucketId, DataUsed, File, FileId};

use crate::codec::{decode_time, decode_value, encode_time, encode_value};
use crate::error::{StoreError, StoreResult};

/// A persisted field of an entity type.
pub trait EntityField: Copy + Sized + 'static {
    /// The entity this field belongs to.
    type Entity;

    /// Every field, in tag order.
    const ALL: &'static [Self];

    /// The field that marks an entity as existing.
    const PRIMARY: Self;

    /// Row tag appended to the entity ID.
    fn tag(self) -> u8;

    /// Field name used in logs and errors.
    fn name(self) -> &'static str;

    /// Projection bit selecting this field, or `None` for store-managed
    /// timestamps, which are written by the store and read on every find.
    fn projection(self) -> Option<DataUsed>;

    fn encode(self, entity: &Self::Entity) -> StoreResult<Vec<u8>>;

    fn decode(self, entity: &mut Self::Entity, bytes: &[u8]) -> StoreResult<()>;

    /// Fields written for `projection`.
    fn written_by(projection: DataUsed) -> impl Iterator<Item = Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |f| f.projection().is_some_and(|p| projection.contains(p)))
    }

    /// Fields read for `projection`, timestamps included.
    fn read_by(projection: DataUsed) -> impl Iterator<Item = Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |f| f.projection().map_or(true, |p| projection.contains(p)))
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BucketField {
    Id = 0x01,
    Name = 0x02,
    Owners = 0x03,
    LuaScript = 0x04,
    MetaData = 0x05,
    StructuralData = 0x06,
    RawData = 0x07,
    FileStoreName = 0x08,
    MetaStoreName = 0x09,
    StructuralStoreName = 0x0a,
    CreatedAt = 0x0b,
    UpdatedAt = 0x0c,
}

impl EntityField for BucketField {
    type Entity = Bucket;

    const ALL: &'static [Self] = &[
        Self::Id,
        Self::Name,
        Self::Owners,
        Self::LuaScript,
        Self::MetaData,
        Self::StructuralData,
        Self::RawData,
        Self::FileStoreName,
        Self::MetaStoreName,
        Self::StructuralStoreName,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    const PRIMARY: Self = Self::Id;

    fn tag(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "bucket_id",
            Self::Name => "bucket_name",
            Self::Owners => "owners",
            Self::LuaScript => "lua_script",
            Self::MetaData => "meta_data",
            Self::StructuralData => "structural_data",
            Self::RawData => "raw_data",
            Self::FileStoreName => "file_store_name",
            Self::MetaStoreName => "meta_store_name",
            Self::StructuralStoreName => "structural_store_name",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn projection(self) -> Option<DataUsed> {
        match self {
            Self::Id => Some(DataUsed::PRIMARY_IDS),
            Self::Name => Some(DataUsed::PRIMARY_NAMES),
            Self::Owners => Some(DataUsed::OWNERS),
            Self::LuaScript => Some(DataUsed::LUA_SCRIPT),
            Self::MetaData => Some(DataUsed::META_DATA),
            Self::StructuralData => Some(DataUsed::STRUCTURAL_DATA),
            Self::RawData => Some(DataUsed::RAW_DATA),
            Self::FileStoreName | Self::MetaStoreName | Self::StructuralStoreName => {
                Some(DataUsed::BUCKET_STORE_NAMES)
            }
            Self::CreatedAt | Self::UpdatedAt => None,
        }
    }

    fn encode(self, b: &Bucket) -> StoreResult<Vec<u8>> {
        let name = self.name();
        match self {
            Self::Id => Ok(b.id.as_bytes().to_vec()),
            Self::Name => encode_value(name, &b.name),
            Self::Owners => encode_value(name, &b.owners),
            Self::LuaScript => Ok(b.lua_script.clone()),
            Self::MetaData => encode_value(name, &b.meta_data),
            Self::StructuralData => encode_value(name, &b.structural_data),
            Self::RawData => Ok(b.raw_data.clone()),
            Self::FileStoreName => encode_value(name, &b.file_store_name),
            Self::MetaStoreName => encode_value(name, &b.meta_store_name),
            Self::StructuralStoreName => encode_value(name, &b.structural_store_name),
            Self::CreatedAt => Ok(encode_time(&b.created_at).to_vec()),
            Self::UpdatedAt => Ok(encode_time(&b.updated_at).to_vec()),
        }
    }

    fn decode(self, b: &mut Bucket, bytes: &[u8]) -> StoreResult<()> {
        let name = self.name();
        match self {
            Self::Id => b.id = BucketId::from_slice(bytes).map_err(|e| decode_err(name, e))?,
            Self::Name => b.name = decode_value(name, bytes)?,
            Self::Owners => b.owners = decode_value(name, bytes)?,
            Self::LuaScript => b.lua_script = bytes.to_vec(),
            Self::MetaData => b.meta_data = decode_value(name, bytes)?,
            Self::StructuralData => b.structural_data = decode_value(name, bytes)?,
            Self::RawData => b.raw_data = bytes.to_vec(),
            Self::FileStoreName => b.file_store_name = decode_value(name, bytes)?,
            Self::MetaStoreName => b.meta_store_name = decode_value(name, bytes)?,
            Self::StructuralStoreName => b.structural_store_name = decode_value(name, bytes)?,
            Self::CreatedAt => b.created_at = decode_time(name, bytes)?,
            Self::UpdatedAt => b.updated_at = decode_time(name, bytes)?,
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileField {
    Id = 0x01,
    BucketId = 0x02,
    Name = 0x03,
    ContentType = 0x04,
    Owners = 0x05,
    IsPrivate = 0x06,
    IsReadOnly = 0x07,
    LuaScript = 0x08,
    MetaData = 0x09,
    StructuralData = 0x0a,
    RawData = 0x0b,
    CreatedAt = 0x0c,
    UpdatedAt = 0x0d,
}

impl EntityField for FileField {
    type Entity = File;

    const ALL: &'static [Self] = &[
        Self::Id,
        Self::BucketId,
        Self::Name,
        Self::ContentType,
        Self::Owners,
        Self::IsPrivate,
        Self::IsReadOnly,
        Self::LuaScript,
        Self::MetaData,
        Self::StructuralData,
        Self::RawData,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    const PRIMARY: Self = Self::Id;

    fn tag(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "file_id",
            Self::BucketId => "bucket_id",
            Self::Name => "file_name",
            Self::ContentType => "content_type",
            Self::Owners => "owners",
            Self::IsPrivate => "is_private",
            Self::IsReadOnly => "is_read_only",
            Self::LuaScript => "lua_script",
            Self::MetaData => "meta_data",
            Self::StructuralData => "structural_data",
            Self::RawData => "raw_data",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn projection(self) -> Option<DataUsed> {
        match self {
            Self::Id | Self::BucketId => Some(DataUsed::PRIMARY_IDS),
            Self::Name => Some(DataUsed::PRIMARY_NAMES),
            Self::ContentType => Some(DataUsed::CONTENT_TYPE),
            Self::Owners => Some(DataUsed::OWNERS),
            Self::IsPrivate | Self::IsReadOnly => Some(DataUsed::ACCESS_STATUS),
            Self::LuaScript => Some(DataUsed::LUA_SCRIPT),
            Self::MetaData => Some(DataUsed::META_DATA),
            Self::StructuralData => Some(DataUsed::STRUCTURAL_DATA),
            Self::RawData => Some(DataUsed::RAW_DATA),
            Self::CreatedAt | Self::UpdatedAt => None,
        }
    }

    fn encode(self, f: &File) -> StoreResult<Vec<u8>> {
        let name = self.name();
        match self {
            Self::Id => Ok(f.id.as_bytes().to_vec()),
            Self::BucketId => Ok(f.bucket_id.as_bytes().to_vec()),
            Self::Name => encode_value(name, &f.name),
            Self::ContentType => encode_value(name, &f.content_type),
            Self::Owners => encode_value(name, &f.owners),
            Self::IsPrivate => encode_value(name, &f.is_private),
            Self::IsReadOnly => encode_value(name, &f.is_read_only),
            Self::LuaScript => Ok(f.lua_script.clone()),
            Self::MetaData => encode_value(name, &f.meta_data),
            Self::StructuralData => encode_value(name, &f.structural_data),
            Self::RawData => Ok(f.raw_data.clone()),
            Self::CreatedAt => Ok(encode_time(&f.created_at).to_vec()),
            Self::UpdatedAt => Ok(encode_time(&f.updated_at).to_vec()),
        }
    }

    fn decode(self, f: &mut File, bytes: &[u8]) -> StoreResult<()> {
        let name = self.name();
        match self {
            Self::Id => f.id = FileId::from_slice(bytes).map_err(|e| decode_err(name, e))?,
            Self::BucketId => {
                f.bucket_id = BucketId::from_slice(bytes).map_err(|e| decode_err(name, e))?
            }
            Self::Name => f.name = decode_value(name, bytes)?,
            Self::ContentType => f.content_type = decode_value(name, bytes)?,
            Self::Owners => f.owners = decode_value(name, bytes)?,
            Self::IsPrivate => f.is_private = decode_value(name, bytes)?,
            Self::IsReadOnly => f.is_read_only = decode_value(name, bytes)?,
            Self::LuaScript => f.lua_script = bytes.to_vec(),
            Self::MetaData => f.meta_data = decode_value(name, bytes)?,
            Self::StructuralData => f.structural_data = decode_value(name, bytes)?,
            Self::RawData => f.raw_data = bytes.to_vec(),
            Self::CreatedAt => f.created_at = decode_time(name, bytes)?,
            Self::UpdatedAt => f.updated_at = decode_time(name, bytes)?,
        }
        Ok(())
    }
}

fn decode_err(field: &'static str, err: fader_types::TypeError) -> StoreError {
    StoreError::Decode {
        field,
        reason: err.to_string(),
    }
}
