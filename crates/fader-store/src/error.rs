/// Errors from store operations.
///
/// Variants fall into three kinds: absence (`*NotFound`), caller errors
/// (`NilId`, `AlreadyExists`) and internal failures (everything else).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No bucket exists for the requested ID or name.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// No file exists for the requested ID or name.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Attempted to create or update an entity with the nil UUID.
    #[error("cannot store {0} with nil ID")]
    NilId(&'static str),

    /// The name (or ID) is already taken by another entity.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },

    /// A stored field could not be decoded.
    #[error("corrupt {field} field: {reason}")]
    Decode { field: &'static str, reason: String },

    /// A field value could not be encoded.
    #[error("cannot encode {field} field: {reason}")]
    Encode { field: &'static str, reason: String },

    /// Failure inside the storage engine (transaction, table, commit).
    #[error("storage engine error: {0}")]
    Engine(#[from] redb::Error),

    /// A visitor passed to a full scan aborted it.
    #[error("scan aborted: {0}")]
    Visitor(String),
}

impl StoreError {
    /// Returns `true` for "no such record" errors, which callers may treat as absence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_) | Self::FileNotFound(_))
    }

    /// Returns `true` for caller errors rejected before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NilId(_) | Self::AlreadyExists { .. })
    }

    /// Returns `true` for decode and engine failures that should be surfaced.
    pub fn is_internal(&self) -> bool {
        !self.is_not_found() && !self.is_validation()
    }
}

macro_rules! engine_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    Self::Engine(err.into())
                }
            }
        )*
    };
}

engine_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert!(StoreError::BucketNotFound("x".into()).is_not_found());
        assert!(StoreError::FileNotFound("x".into()).is_not_found());
        assert!(StoreError::NilId("file").is_validation());
        let decode = StoreError::Decode {
            field: "meta_data",
            reason: "eof".into(),
        };
        assert!(decode.is_internal());
        assert!(!decode.is_not_found());
    }
}
