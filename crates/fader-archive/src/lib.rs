//! Archive codec for Fader.
//!
//! An archive moves an entire store between instances as newline-separated
//! text:
//!
//! ```text
//! base64(fader|version|author|timestamp|description)
//! base64(bincode(bucket))      one line per bucket
//! --fader-end-of-buckets--
//! base64(bincode(file))        one line per file
//! ```
//!
//! Import is record-at-a-time and never rolled back. Under
//! [`ImportPolicy::BestEffort`](fader_types::ImportPolicy) undecodable lines
//! are logged and skipped; [`ImportReport`] carries the counts.

pub mod archive;
pub mod error;
pub mod info;
pub mod record;

pub use archive::{Archive, ImportReport};
pub use error::{ArchiveError, ArchiveResult};
pub use info::{ArchiveInfoLine, APP_NAME, BUCKETS_END};
pub use record::{PackedBucket, PackedFile};
