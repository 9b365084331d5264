//! Live filesystem watcher for the Fader workspace.
//!
//! Operating systems report the same logical action as different sequences
//! of low-level notifications. The watcher buffers notifications per parent
//! directory for a short window, then classifies each window into one
//! semantic [`WatchOp`] and hands it to a caller-supplied hook.
//!
//! # Key Types
//!
//! - [`LiveWatcher`] / [`WatcherHandle`] -- The notify-backed watch task
//! - [`Coalescer`] -- Pure, clock-injected buffering and classification
//! - [`RawEvent`] / [`RawOp`] -- Normalized low-level notifications
//! - [`WatchEvent`] / [`WatchOp`] -- Classified operations delivered to hooks

pub mod coalescer;
pub mod error;
pub mod op;
pub mod watcher;

pub use coalescer::{classify, Coalescer};
pub use error::{WatchError, WatchResult};
pub use op::{normalize, RawEvent, RawOp, WatchEvent, WatchOp};
pub use watcher::{LiveWatcher, WatchConfig, WatchHook, WatcherHandle};
