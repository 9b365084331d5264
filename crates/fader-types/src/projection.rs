//! Field projections.
//!
//! A [`DataUsed`] value selects which fields of a bucket or file a store
//! operation reads or writes. Fields outside the projection are neither read
//! nor touched in storage.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Projection bitmask over entity fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataUsed(u16);

impl DataUsed {
    /// No fields.
    pub const NONE: Self = Self(0);
    /// `BucketID` (and for files, `FileID` + owning `BucketID`).
    pub const PRIMARY_IDS: Self = Self(1 << 0);
    /// `BucketName` / `FileName`.
    pub const PRIMARY_NAMES: Self = Self(1 << 1);
    pub const CONTENT_TYPE: Self = Self(1 << 2);
    pub const OWNERS: Self = Self(1 << 3);
    /// `IsPrivate` + `IsReadOnly`.
    pub const ACCESS_STATUS: Self = Self(1 << 4);
    pub const LUA_SCRIPT: Self = Self(1 << 5);
    pub const META_DATA: Self = Self(1 << 6);
    pub const STRUCTURAL_DATA: Self = Self(1 << 7);
    pub const RAW_DATA: Self = Self(1 << 8);
    /// The three store-name reference strings of a bucket.
    pub const BUCKET_STORE_NAMES: Self = Self(1 << 9);

    /// Every field of a file.
    pub const FULL_FILE: Self = Self::PRIMARY_IDS
        .union(Self::PRIMARY_NAMES)
        .union(Self::CONTENT_TYPE)
        .union(Self::OWNERS)
        .union(Self::ACCESS_STATUS)
        .union(Self::LUA_SCRIPT)
        .union(Self::META_DATA)
        .union(Self::STRUCTURAL_DATA)
        .union(Self::RAW_DATA);

    /// Every field of a bucket.
    pub const FULL_BUCKET: Self = Self::PRIMARY_IDS
        .union(Self::PRIMARY_NAMES)
        .union(Self::OWNERS)
        .union(Self::LUA_SCRIPT)
        .union(Self::META_DATA)
        .union(Self::STRUCTURAL_DATA)
        .union(Self::RAW_DATA)
        .union(Self::BUCKET_STORE_NAMES);

    /// Every file field except the raw payload.
    pub const FILE_WITHOUT_RAW_DATA: Self = Self(Self::FULL_FILE.0 & !Self::RAW_DATA.0);

    /// The four content facets mirrored as workspace artifacts.
    pub const WORKSPACE_ARTIFACTS: Self = Self::LUA_SCRIPT
        .union(Self::META_DATA)
        .union(Self::STRUCTURAL_DATA)
        .union(Self::RAW_DATA);

    const NAMED: [(Self, &'static str); 10] = [
        (Self::PRIMARY_IDS, "PrimaryIDs"),
        (Self::PRIMARY_NAMES, "PrimaryNames"),
        (Self::CONTENT_TYPE, "ContentType"),
        (Self::OWNERS, "Owners"),
        (Self::ACCESS_STATUS, "AccessStatus"),
        (Self::LUA_SCRIPT, "LuaScript"),
        (Self::META_DATA, "MetaData"),
        (Self::STRUCTURAL_DATA, "StructuralData"),
        (Self::RAW_DATA, "RawData"),
        (Self::BUCKET_STORE_NAMES, "BucketStoreNames"),
    ];

    /// Bitwise union, usable in const context.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag in `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Names of the flags set in this projection.
    pub fn flag_names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for DataUsed {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for DataUsed {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DataUsed {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for DataUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "DataUsed(None)");
        }
        write!(f, "DataUsed({})", self.flag_names().join(" | "))
    }
}

/// Parses a `|`-separated list of flag names, e.g. `"PrimaryIDs|RawData"`.
impl FromStr for DataUsed {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut projection = Self::NONE;
        for part in s.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            let flag = match part {
                "FullFile" => Self::FULL_FILE,
                "FullBucket" => Self::FULL_BUCKET,
                "FileWithoutRawData" => Self::FILE_WITHOUT_RAW_DATA,
                other => Self::NAMED
                    .iter()
                    .find(|(_, name)| *name == other)
                    .map(|(flag, _)| *flag)
                    .ok_or_else(|| TypeError::UnknownFlag(other.to_string()))?,
            };
            projection |= flag;
        }
        Ok(projection)
    }
}
