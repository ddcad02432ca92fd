//! Filesystem monitoring and change detection
//!
//! This module turns raw notify events into [`FileChange`]s for the workflow
//! dispatcher:
//! - Hidden files, editor temp files and ignore-pattern matches are dropped
//! - Bursts of events for one path are debounced into a single change

pub mod debouncer;
pub mod watcher;

pub use debouncer::{Debouncer, DebouncerConfig};
pub use watcher::{FileWatcher, WatchHandle, WatcherConfig};

use std::path::PathBuf;
use std::time::SystemTime;

/// Represents a detected filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
    pub timestamp: SystemTime,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            timestamp: SystemTime::now(),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeType::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeType::Modified)
    }
}

/// Coarse kind of a filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Renamed,
    Other,
}

impl ChangeType {
    /// Combine two changes to the same path seen within one debounce window
    pub fn merge(self, newer: ChangeType) -> ChangeType {
        match (self, newer) {
            // a file still being written after creation is still a new file
            (ChangeType::Created, ChangeType::Modified) => ChangeType::Created,
            (_, newer) => newer,
        }
    }
}
