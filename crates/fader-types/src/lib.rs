//! Foundation types for Fader.
//!
//! This crate provides the entity and identifier types shared by the store,
//! the workspace synchronizer and the archive codec. Every other Fader crate
//! depends on `fader-types`.
//!
//! # Key Types
//!
//! - [`Bucket`] -- Named collection of files, the top-level content grouping
//! - [`File`] -- Named item within a bucket carrying four content facets
//! - [`BucketId`] / [`FileId`] -- UUID-backed primary identifiers
//! - [`DataUsed`] -- Field projection bitmask driving partial reads and writes
//! - [`ImportPolicy`] -- Strict vs best-effort handling of bulk import failures

pub mod bucket;
pub mod error;
pub mod file;
pub mod identity;
pub mod policy;
pub mod projection;

pub use bucket::Bucket;
pub use error::TypeError;
pub use file::File;
pub use identity::{BucketId, FileId};
pub use policy::ImportPolicy;
pub use projection::DataUsed;

/// String-keyed map of arbitrary structured values (meta and structural data).
pub type StructuredMap = std::collections::BTreeMap<String, serde_json::Value>;
