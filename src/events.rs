// src/events.rs

//! Progress events emitted while the executor runs a batch of migrations.

use crate::catalog::CatalogEntry;

/// A single step of executor progress, for CLI output and embedding callers.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// About to run `entry`, ordered as `index` of `total`.
    Applying {
        entry: CatalogEntry,
        index: usize,
        total: usize,
    },
    /// `entry` finished successfully.
    Applied {
        entry: CatalogEntry,
        index: usize,
        total: usize,
    },
    /// `entry`'s rollback statements ran successfully.
    RolledBack {
        entry: CatalogEntry,
        index: usize,
        total: usize,
    },
    /// `entry` failed; the batch stops here.
    Failed { entry: CatalogEntry, message: String },
}

impl ProgressEvent {
    pub fn entry(&self) -> &CatalogEntry {
        match self {
            ProgressEvent::Applying { entry, .. }
            | ProgressEvent::Applied { entry, .. }
            | ProgressEvent::RolledBack { entry, .. }
            | ProgressEvent::Failed { entry, .. } => entry,
        }
    }
}

/// Receives [`ProgressEvent`]s as the executor runs. The CLI implementation
/// prints them; tests can collect them into a `Vec`.
pub trait ProgressSink {
    fn on_event(&mut self, event: ProgressEvent);
}

/// A sink that discards every event, used where progress reporting is
/// irrelevant (dry runs computed for output other than a terminal).
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&mut self, _event: ProgressEvent) {}
}

/// A sink that records every event, used by tests.
#[derive(Default)]
pub struct VecSink(pub Vec<ProgressEvent>);

impl ProgressSink for VecSink {
    fn on_event(&mut self, event: ProgressEvent) {
        self.0.push(event);
    }
}
