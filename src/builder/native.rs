//! Native project builds.
//!
//! A project flagged `native` is not compiled by the Java toolchain; its
//! directory is handed to GNU make, whose own dependency tracking is
//! authoritative for staleness.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::util::process::{find_make, ProcessBuilder, StreamLine};

/// Runner for native (make-based) projects.
#[derive(Debug, Clone)]
pub struct NativeBuilder {
    make: PathBuf,
    timeout: Option<Duration>,
}

impl NativeBuilder {
    /// Locate the make executable; its absence is fatal since declared
    /// native projects cannot be built without it.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let make = find_make().context("no make executable found (tried gmake, make)")?;
        Ok(NativeBuilder { make, timeout })
    }

    /// Use a specific make executable.
    pub fn with_make(make: PathBuf, timeout: Option<Duration>) -> Self {
        NativeBuilder { make, timeout }
    }

    /// Run make in `project_dir`, optionally cleaning first.
    pub fn build(&self, project_dir: &Path, clean_first: bool) -> Result<()> {
        if clean_first {
            self.run_make(project_dir, Some("clean"))?;
        }
        self.run_make(project_dir, None)
    }

    /// Run `make clean` in `project_dir`.
    pub fn clean(&self, project_dir: &Path) -> Result<()> {
        self.run_make(project_dir, Some("clean"))
    }

    fn run_make(&self, project_dir: &Path, target: Option<&str>) -> Result<()> {
        let mut pb = ProcessBuilder::new(&self.make)
            .cwd(project_dir)
            .timeout(self.timeout);
        if let Some(target) = target {
            pb = pb.arg(target);
        }

        tracing::info!("running {} in {}", pb.display_command(), project_dir.display());
        let code = pb.run_streamed(|line| match line {
            StreamLine::Stdout(l) => tracing::info!(target: "make", "{}", l),
            StreamLine::Stderr(l) => tracing::warn!(target: "make", "{}", l),
        })?;
        if code != 0 {
            bail!(
                "`{}` failed with exit code {} in {}",
                pb.display_command(),
                code,
                project_dir.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_make_invocation() {
        let Some(make) = find_make() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Makefile"),
            "all:\n\ttouch built.txt\nclean:\n\trm -f built.txt\n",
        )
        .unwrap();

        let builder = NativeBuilder::with_make(make, None);
        builder.build(tmp.path(), false).unwrap();
        assert!(tmp.path().join("built.txt").exists());

        builder.clean(tmp.path()).unwrap();
        assert!(!tmp.path().join("built.txt").exists());
    }
}
