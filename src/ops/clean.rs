//! Removal of build outputs.

use std::time::Duration;

use anyhow::Result;

use crate::builder::NativeBuilder;
use crate::core::Registry;
use crate::util::fs::remove_dir_all_if_exists;

/// Options for the clean operation.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Clean Java project outputs
    pub java: bool,

    /// Run `make clean` for native projects
    pub native: bool,

    /// Remove distribution archives
    pub distributions: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        CleanOptions {
            java: true,
            native: true,
            distributions: true,
        }
    }
}

/// Remove build outputs for every loaded project and distribution.
pub fn clean(reg: &Registry, opts: &CleanOptions, timeout: Option<Duration>) -> Result<()> {
    let mut native_builder: Option<NativeBuilder> = None;
    for project in reg.projects() {
        if project.is_native() {
            if !opts.native {
                continue;
            }
            if native_builder.is_none() {
                native_builder = Some(NativeBuilder::new(timeout)?);
            }
            let builder = native_builder.as_ref().unwrap();
            builder.clean(project.dir())?;
        } else if opts.java {
            if let Some(out) = project.output_dir() {
                remove_dir_all_if_exists(&out)?;
            }
            if let Some(gen) = project.source_gen_dir() {
                remove_dir_all_if_exists(&gen)?;
            }
        }
    }

    if opts.distributions {
        for dist in reg.distributions() {
            if dist.path().exists() {
                std::fs::remove_file(dist.path())?;
            }
            if let Some(sources) = dist.sources_path() {
                if !dist.is_unified() && sources.exists() {
                    std::fs::remove_file(sources)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Project;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_java_outputs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("p");
        std::fs::create_dir_all(dir.join("bin/com")).unwrap();
        std::fs::create_dir_all(dir.join("src_gen")).unwrap();
        std::fs::write(dir.join("bin/com/A.class"), "A").unwrap();

        let mut reg = Registry::new();
        reg.add_project(Project::new(
            "demo",
            "p",
            dir.clone(),
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        clean(&reg, &CleanOptions::default(), None).unwrap();
        assert!(!dir.join("bin").exists());
        assert!(!dir.join("src_gen").exists());
    }

    #[test]
    fn test_clean_java_disabled() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("p");
        std::fs::create_dir_all(dir.join("bin")).unwrap();

        let mut reg = Registry::new();
        reg.add_project(Project::new(
            "demo",
            "p",
            dir.clone(),
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let opts = CleanOptions {
            java: false,
            ..Default::default()
        };
        clean(&reg, &opts, None).unwrap();
        assert!(dir.join("bin").exists());
    }
}
