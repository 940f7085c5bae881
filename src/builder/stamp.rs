//! Timestamp-based staleness markers.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

use crate::util::fs::{ensure_dir, mtime};

/// A file whose modification time gates rebuild decisions.
///
/// Markers are independent, file-based, last-write-wins state; concurrent
/// orchestrator runs against one tree must be serialized externally.
#[derive(Debug, Clone)]
pub struct TimeStampFile {
    path: PathBuf,
    timestamp: Option<SystemTime>,
}

impl TimeStampFile {
    /// Snapshot the marker at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let timestamp = mtime(&path);
        TimeStampFile { path, timestamp }
    }

    /// Whether the marker file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the marker is older than `other`. A missing marker is
    /// always older; a missing `other` never makes the marker stale.
    pub fn is_older_than(&self, other: &Path) -> bool {
        let Some(own) = self.timestamp else {
            return true;
        };
        match mtime(other) {
            Some(theirs) => theirs > own,
            None => false,
        }
    }

    /// Whether any of `files` is newer than the marker.
    pub fn is_older_than_any<'a>(&self, files: impl IntoIterator<Item = &'a Path>) -> bool {
        files.into_iter().any(|f| self.is_older_than(f))
    }

    /// Create or freshen the marker.
    pub fn touch(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        // An append-mode open updates mtime on close for existing files.
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to touch {}", self.path.display()))?;
        file.set_modified(SystemTime::now())
            .with_context(|| format!("failed to touch {}", self.path.display()))?;
        self.timestamp = mtime(&self.path);
        Ok(())
    }
}
