//! Directory snapshots for the Fader workspace synchronizer.
//!
//! An [`FsTree`] records every path under a root directory with its size,
//! modification time and kind. Two snapshots are compared with [`calculate`],
//! which yields the filesystem operations that turn one into the other.
//!
//! # Key Types
//!
//! - [`FsTree`] -- Path-keyed snapshot of a directory subtree
//! - [`TreeItem`] -- One recorded path
//! - [`ScanOptions`] -- Scan tuning (content hashing)
//! - [`TreeOperation`] / [`OpKind`] -- A single diff operation

pub mod diff;
pub mod error;
pub mod item;
pub mod tree;

pub use diff::{calculate, OpKind, TreeOperation};
pub use error::{FsTreeError, FsTreeResult};
pub use item::TreeItem;
pub use tree::{dir_has_entries, is_ignored_name, FsTree, ScanOptions, STATE_FILE};
