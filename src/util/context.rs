//! Global context for drydock operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::util::config::Config;

/// Project directories for drydock
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "drydock", "drydock"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global drydock data (~/.drydock/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Tool configuration loaded from config.toml
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.cache_dir().to_path_buf()
        } else {
            // Fallback to ~/.drydock
            std::env::var_os("HOME")
                .map(|h| PathBuf::from(h).join(".drydock"))
                .unwrap_or_else(|| PathBuf::from(".drydock"))
        };

        let config = Config::load(&home.join("config.toml"))?;

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
            config,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the drydock home directory (~/.drydock/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the tool configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process-wide subprocess timeout, if configured.
    pub fn subprocess_timeout(&self) -> Option<Duration> {
        self.config.build.timeout_secs.map(Duration::from_secs)
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Find the primary suite configuration (suite.conf) starting from cwd
    /// and searching upward.
    pub fn find_suite(&self) -> Result<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join("suite.conf");
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                anyhow::bail!(
                    "no suite.conf found in {} or any parent directory",
                    self.cwd.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.home().to_string_lossy().contains("drydock"));
    }

    #[test]
    fn test_find_suite() {
        let tmp = TempDir::new().unwrap();
        let conf = tmp.path().join("suite.conf");
        std::fs::write(&conf, "suite=demo\n").unwrap();

        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_suite().unwrap(), conf);
    }
}
