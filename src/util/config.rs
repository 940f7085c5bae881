//! Tool configuration (~/.drydock/config.toml).
//!
//! This is drydock's own settings file, distinct from the suite.conf
//! files that describe a source tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// drydock settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Build-related settings
    #[serde(default)]
    pub build: BuildConfig,
}

/// Settings consumed by the build orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Kill any build subprocess running longer than this many seconds
    pub timeout_secs: Option<u64>,

    /// Fallback compliance level for projects that declare none
    pub compliance: Option<String>,

    /// Path to an alternate batch compiler jar
    pub batch_jar: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert!(config.build.timeout_secs.is_none());
    }

    #[test]
    fn test_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build]\ntimeout_secs = 900\ncompliance = \"1.8\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.build.timeout_secs, Some(900));
        assert_eq!(config.build.compliance.as_deref(), Some("1.8"));
    }
}
