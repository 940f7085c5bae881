//! Version-control queries for suite directories.

use std::path::Path;

use git2::Repository;

/// The checked-out revision of the repository containing `dir`, if any.
///
/// Suites are usually roots of (or nested in) a git checkout; the revision
/// is recorded for build logs and the graph header. A directory outside
/// any repository simply yields `None`.
pub fn revision(dir: &Path) -> Option<String> {
    let repo = Repository::discover(dir).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Short (12 hex digit) form of [`revision`].
pub fn short_revision(dir: &Path) -> Option<String> {
    revision(dir).map(|r| r.chars().take(12).collect())
}
