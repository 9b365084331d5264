use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("line {line}: invalid base64: {source}")]
    Base64 {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("line {line}: corrupt record: {reason}")]
    Record { line: usize, reason: String },

    #[error("archive was written by {found:?}, expected {expected:?}")]
    AppName { expected: String, found: String },

    #[error("malformed info line: {0}")]
    MalformedInfo(String),

    #[error("info field {field} cannot contain '|' or line breaks")]
    InvalidInfoField { field: &'static str },

    #[error("archive has no valid info line")]
    MissingInfo,

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("store error: {0}")]
    Store(#[from] fader_store::StoreError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
