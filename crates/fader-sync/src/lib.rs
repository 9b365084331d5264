//! Workspace synchronizer for Fader.
//!
//! Keeps a store consistent with its mirrored directory tree:
//!
//! ```text
//! <workspace>/<bucket>/<file>/<file>                 raw data
//! <workspace>/<bucket>/<file>/script.lua             Lua script
//! <workspace>/<bucket>/<file>/structural_data.json   structural data
//! <workspace>/<bucket>/<file>/meta.json              meta data
//! <workspace>/.fader_index                           tree snapshot
//! ```
//!
//! # Key Types
//!
//! - [`Synchronizer`] -- Initialization direction plus steady-state drivers
//! - [`WorkspaceImporter`] / [`WorkspaceExporter`] -- Bulk directory <-> store copies
//! - [`ChangeSource`] -- Producer of change batches ([`PollingSource`], [`LiveSource`])
//! - [`SyncConfig`] -- TOML-loadable settings

pub mod config;
pub mod error;
pub mod layout;
pub mod source;
pub mod synchronizer;
pub mod workspace;

pub use config::{DriverKind, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use layout::{ArtifactKind, WorkspacePath};
pub use source::{Change, ChangeKind, ChangeSource, LiveSource, PollingSource, WatchRoot};
pub use synchronizer::{ApplyReport, InitOutcome, Synchronizer, WatchHandle};
pub use workspace::{ExportStats, ImportStats, WorkspaceExporter, WorkspaceImporter};
