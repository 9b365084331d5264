use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The nil (all-zero) identifier. Never valid for create/update.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Returns `true` if this is the nil identifier.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            pub fn uuid(&self) -> Uuid {
                self.0
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Build from a raw byte slice, which must be exactly 16 bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
                Uuid::from_slice(bytes)
                    .map(Self)
                    .map_err(|_| TypeError::InvalidLength {
                        expected: 16,
                        actual: bytes.len(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId(e.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Primary key of a [`Bucket`](crate::Bucket). Immutable once assigned.
    BucketId
);

uuid_id!(
    /// Primary key of a [`File`](crate::File). Immutable once assigned.
    FileId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique_and_non_nil() {
        let a = BucketId::new();
        let b = BucketId::new();
        assert_ne!(a, b);
        assert!(!a.is_nil());
    }

    #[test]
    fn nil_is_nil() {
        assert!(FileId::nil().is_nil());
        assert!(FileId::default().is_nil());
    }

    #[test]
    fn from_slice_roundtrip() {
        let id = FileId::new();
        let back = FileId::from_slice(id.as_bytes()).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = BucketId::from_slice(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 16,
                actual: 3
            }
        );
    }

    #[test]
    fn parse_and_display() {
        let id = BucketId::new();
        let parsed: BucketId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<BucketId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = BucketId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
