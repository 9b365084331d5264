//! Field-projected object store for Fader.
//!
//! Buckets and files are persisted as one row per field under a shared
//! 16-byte ID prefix, so a read or write only touches the rows selected by
//! its [`DataUsed`](fader_types::DataUsed) projection. Name lookups go
//! through hash-keyed secondary indices.
//!
//! # Layout
//!
//! ```text
//! buckets       [bucket id | field tag] -> encoded field
//! files         [file id   | field tag] -> encoded field
//! bucket_names  blake3(name)            -> bucket id
//! file_names    blake3(bucket id, name) -> bucket id | file id
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`DbManager`] trait:
//!
//! - [`RedbStore`] -- redb database, on disk or in memory
//!
//! # Design Rules
//!
//! 1. Every create/update/delete commits in exactly one write transaction.
//! 2. Fields outside a write projection are never touched.
//! 3. `created_at` is written once; `updated_at` on every mutation.
//! 4. Absence is reported as a `NotFound` error, distinct from decode and
//!    engine failures.

pub mod codec;
pub mod error;
pub mod field;
pub mod key;
pub mod redb_store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use field::{BucketField, EntityField, FileField};
pub use redb_store::RedbStore;
pub use traits::{BucketImportManager, BucketManager, DbManager, FileImportManager, FileManager};
