//! Windowed coalescing of raw notifications.
//!
//! Events are grouped by parent directory. The first event for a directory
//! opens a window; every further event pushes its deadline out again. When a
//! window closes, its multiset of raw ops is looked up in a fixed table of
//! known patterns. Unknown multisets are dropped.
//!
//! The coalescer owns no clock: callers pass the current [`Instant`], so the
//! classification is fully deterministic under test.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::op::{RawEvent, RawOp, WatchEvent, WatchOp};

#[derive(Debug)]
struct Window {
    deadline: Instant,
    events: Vec<RawEvent>,
}

/// Buffers raw events into per-directory windows.
#[derive(Debug)]
pub struct Coalescer {
    window: Duration,
    pending: HashMap<PathBuf, Window>,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Add an event, opening or extending the window of its directory.
    pub fn push(&mut self, event: RawEvent, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(event.parent())
            .and_modify(|w| w.deadline = deadline)
            .or_insert_with(|| Window {
                deadline,
                events: Vec::new(),
            })
            .events
            .push(event);
    }

    /// The earliest deadline among open windows.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|w| w.deadline).min()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Close every window whose deadline has passed and classify it.
    ///
    /// `is_dir` decides between `RenameFile` and `RenameFolder`.
    pub fn drain_due(&mut self, now: Instant, is_dir: impl Fn(&Path) -> bool) -> Vec<WatchEvent> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, w)| w.deadline <= now)
            .map(|(dir, _)| dir.clone())
            .collect();

        let mut out = Vec::new();
        for dir in due {
            if let Some(window) = self.pending.remove(&dir) {
                out.extend(classify_window(&window.events, &is_dir));
            }
        }
        out
    }

    /// Close every window regardless of deadline.
    pub fn flush(&mut self, is_dir: impl Fn(&Path) -> bool) -> Vec<WatchEvent> {
        let mut out = Vec::new();
        for (_, window) in self.pending.drain() {
            out.extend(classify_window(&window.events, &is_dir));
        }
        out
    }
}

/// Classify one window. A rename pair is matched across paths; anything else
/// is classified per path so unrelated siblings do not mask each other.
fn classify_window(events: &[RawEvent], is_dir: &dyn Fn(&Path) -> bool) -> Vec<WatchEvent> {
    if let Some(event) = classify(events, is_dir) {
        return vec![event];
    }

    let mut paths: Vec<&PathBuf> = Vec::new();
    for e in events {
        if !paths.contains(&&e.path) {
            paths.push(&e.path);
        }
    }
    if paths.len() < 2 {
        debug!(events = ?events, "dropping unrecognized event window");
        return Vec::new();
    }

    let mut out = Vec::new();
    for path in paths {
        let group: Vec<RawEvent> = events.iter().filter(|e| &e.path == path).cloned().collect();
        match classify(&group, is_dir) {
            Some(event) => out.push(event),
            None => debug!(path = %path.display(), events = ?group, "dropping unrecognized event window"),
        }
    }
    out
}

#[derive(Default)]
struct Histogram {
    create: usize,
    write: usize,
    remove: usize,
    rename: usize,
    chmod: usize,
}

impl Histogram {
    fn of(events: &[RawEvent]) -> Self {
        let mut h = Self::default();
        for e in events {
            match e.op {
                RawOp::Create => h.create += 1,
                RawOp::Write => h.write += 1,
                RawOp::Remove => h.remove += 1,
                RawOp::Rename => h.rename += 1,
                RawOp::Chmod => h.chmod += 1,
            }
        }
        h
    }
}

/// Map a multiset of raw events to a semantic operation.
///
/// Patterns, as `(create, write, remove, rename, chmod)` counts:
///
/// | counts | operation |
/// |---|---|
/// | `(1,0,0,0,0)` `(1,0,0,0,1)` | `CreateFileOrFolder` |
/// | `(0,1,0,0,0)` `(0,2,0,0,0)` `(0,1,0,0,1)` `(0,2,0,0,1)` | `ModifyOrCreateFile` |
/// | `(1,1,0,0,0)` `(1,2,0,0,0)` `(1,1,0,0,1)` | `ModifyOrCreateFile` |
/// | `(0,0,1,0,0)` `(0,0,2,0,0)` `(0,0,1,0,1)` `(0,0,0,1,0)` | `RemoveFileOrFolder` |
/// | `(1,0,0,1,0)` | `RenameFile` / `RenameFolder` |
///
/// Returns `None` for any other multiset, and for non-rename patterns whose
/// events do not all name the same path.
pub fn classify(events: &[RawEvent], is_dir: &dyn Fn(&Path) -> bool) -> Option<WatchEvent> {
    let first = events.first()?;
    let h = Histogram::of(events);

    let op = match (h.create, h.write, h.remove, h.rename, h.chmod) {
        (1, 0, 0, 1, 0) => {
            let old = events.iter().find(|e| e.op == RawOp::Rename)?;
            let new = events.iter().find(|e| e.op == RawOp::Create)?;
            let op = if is_dir(&new.path) {
                WatchOp::RenameFolder
            } else {
                WatchOp::RenameFile
            };
            return Some(WatchEvent::rename(op, old.path.clone(), new.path.clone()));
        }
        (1, 0, 0, 0, 0) | (1, 0, 0, 0, 1) => WatchOp::CreateFileOrFolder,
        (0, 1 | 2, 0, 0, 0 | 1) => WatchOp::ModifyOrCreateFile,
        (1, 1 | 2, 0, 0, 0) | (1, 1, 0, 0, 1) => WatchOp::ModifyOrCreateFile,
        (0, 0, 1 | 2, 0, 0) | (0, 0, 1, 0, 1) | (0, 0, 0, 1, 0) => WatchOp::RemoveFileOrFolder,
        _ => return None,
    };

    if events.iter().any(|e| e.path != first.path) {
        return None;
    }
    Some(WatchEvent::new(op, first.path.clone()))
}
