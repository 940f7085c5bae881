//! Dependency canonicalization.
//!
//! Rewrites each suite's `project@<name>@dependencies=` lines to the
//! canonical (non-redundant) dependency set, after verifying that every
//! declared project dependency actually contributes an imported package.
//! The returned count of changed files doubles as the command's exit
//! status, so CI can treat "anything rewritten" as a failure.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;

use crate::core::{Project, Registry};
use crate::graph::{self, ClosureOptions};
use crate::util::fs::{read_to_string, update_file};

static DEPS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^project@([^@]+)@dependencies=.*$").unwrap());

/// Canonicalize every loaded suite's configuration file in place.
///
/// Returns the number of files rewritten.
pub fn canonicalize(reg: &Registry) -> Result<usize> {
    let mut changed_files = 0;
    for suite in reg.suites() {
        let conf = suite.conf_path();
        if !conf.exists() {
            continue;
        }
        let content = read_to_string(&conf)?;
        let mut out = String::with_capacity(content.len());

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            let Some(cap) = DEPS_LINE_RE.captures(trimmed) else {
                out.push_str(line);
                out.push('\n');
                continue;
            };
            let name = cap[1].to_string();
            let Some(project) = reg.project(&name) else {
                // Ignored or filtered projects keep their declaration.
                out.push_str(line);
                out.push('\n');
                continue;
            };

            check_package_prefixes(reg, project)?;
            check_declared_deps_used(reg, project, &conf.display().to_string(), idx + 1)?;

            let canonical = graph::canonical_dependencies(reg, &name)?;
            out.push_str(&format!(
                "project@{}@dependencies={}\n",
                name,
                canonical.join(",")
            ));
        }

        if update_file(&conf, &out)? {
            changed_files += 1;
        }
    }
    Ok(changed_files)
}

/// Every package a project defines must be prefixed with the project
/// name, so canonical dependencies can be inferred from imports.
fn check_package_prefixes(reg: &Registry, project: &Project) -> Result<()> {
    for pkg in project.defined_packages(reg)? {
        if !pkg.starts_with(project.name()) {
            bail!(
                "package in {} does not have prefix matching project name: {}",
                project.name(),
                pkg
            );
        }
    }
    Ok(())
}

/// A declared project dependency that contributes no imported package is
/// dead weight; report it together with the dependencies the imports
/// actually require.
fn check_declared_deps_used(
    reg: &Registry,
    project: &Project,
    file: &str,
    line: usize,
) -> Result<()> {
    let imported = project.imported_packages(reg)?.clone();

    let mut unused: BTreeSet<String> = project
        .deps()
        .iter()
        .filter(|d| reg.project(d).is_some())
        .cloned()
        .collect();
    for pkg in &imported {
        for dep_name in project.deps() {
            let Some(dep) = reg.project(dep_name) else {
                unused.remove(dep_name);
                continue;
            };
            if dep.defined_packages(reg)?.contains(pkg)
                || dep.extended_packages(reg)?.contains(pkg)
            {
                unused.remove(dep_name);
            }
        }
    }
    if unused.is_empty() {
        return Ok(());
    }

    // Projects whose defined packages satisfy the imports.
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    for other in reg.projects() {
        if !other.defined_packages(reg)?.is_disjoint(&imported) {
            candidates.insert(other.name().to_string());
        }
    }
    // Keep only canonical candidates.
    for candidate in candidates.clone() {
        let reachable = graph::transitive_closure(
            reg,
            &candidate,
            ClosureOptions {
                include_libs: false,
                include_self: false,
                include_processors: false,
            },
        )?;
        for name in reachable {
            candidates.remove(&name);
        }
    }

    bail!(
        "{}:{}: {} does not use any packages defined in these projects: {}\nComputed project dependencies: {}",
        file,
        line,
        project.name(),
        unused.into_iter().collect::<Vec<_>>().join(", "),
        candidates.into_iter().collect::<Vec<_>>().join(",")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &std::path::Path, pkg: &str, class: &str, content: &str) {
        let pkg_dir = dir.join(pkg.replace('.', "/"));
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join(format!("{}.java", class)), content).unwrap();
    }

    fn demo_suite(tmp: &TempDir, deps_line: &str) -> Registry {
        let conf = format!(
            "suite=demo\n\
             project@base@sourceDirs=src\n\
             project@base@javaCompliance=1.8\n\
             project@app@sourceDirs=src\n\
             project@app@javaCompliance=1.8\n\
             {}\n",
            deps_line
        );
        std::fs::write(tmp.path().join("suite.conf"), conf).unwrap();

        write_source(
            &tmp.path().join("base/src"),
            "base.util",
            "Strings",
            "package base.util;\npublic class Strings {}\n",
        );
        write_source(
            &tmp.path().join("app/src"),
            "app.main",
            "Main",
            "package app.main;\nimport base.util.Strings;\npublic class Main {}\n",
        );

        let mut reg = Registry::new();
        reg.load_suite(tmp.path()).unwrap();
        reg
    }

    #[test]
    fn test_canonical_file_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let reg = demo_suite(&tmp, "project@app@dependencies=base");

        assert_eq!(canonicalize(&reg).unwrap(), 0);
    }

    #[test]
    fn test_redundant_dependency_rewritten() {
        let tmp = TempDir::new().unwrap();
        // "extra" project exists and is reachable through base.
        let conf = "suite=demo\n\
             project@low@sourceDirs=src\n\
             project@low@javaCompliance=1.8\n\
             project@base@sourceDirs=src\n\
             project@base@javaCompliance=1.8\n\
             project@base@dependencies=low\n\
             project@app@sourceDirs=src\n\
             project@app@javaCompliance=1.8\n\
             project@app@dependencies=base,low\n";
        std::fs::write(tmp.path().join("suite.conf"), conf).unwrap();

        write_source(
            &tmp.path().join("low/src"),
            "low",
            "Low",
            "package low;\npublic class Low {}\n",
        );
        write_source(
            &tmp.path().join("base/src"),
            "base",
            "Base",
            "package base;\nimport low.Low;\npublic class Base {}\n",
        );
        write_source(
            &tmp.path().join("app/src"),
            "app",
            "Main",
            "package app;\nimport base.Base;\nimport low.Low;\npublic class Main {}\n",
        );

        let mut reg = Registry::new();
        reg.load_suite(tmp.path()).unwrap();

        assert_eq!(canonicalize(&reg).unwrap(), 1);
        let rewritten = read_to_string(&tmp.path().join("suite.conf")).unwrap();
        assert!(rewritten.contains("project@app@dependencies=base\n"));
        // Idempotent on the second pass.
        assert_eq!(canonicalize(&reg).unwrap(), 0);
    }

    #[test]
    fn test_unused_dependency_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let conf = "suite=demo\n\
             project@base@sourceDirs=src\n\
             project@base@javaCompliance=1.8\n\
             project@app@sourceDirs=src\n\
             project@app@javaCompliance=1.8\n\
             project@app@dependencies=base\n";
        std::fs::write(tmp.path().join("suite.conf"), conf).unwrap();

        write_source(
            &tmp.path().join("base/src"),
            "base",
            "Base",
            "package base;\npublic class Base {}\n",
        );
        // app imports nothing from base.
        write_source(
            &tmp.path().join("app/src"),
            "app",
            "Main",
            "package app;\npublic class Main {}\n",
        );

        let mut reg = Registry::new();
        reg.load_suite(tmp.path()).unwrap();

        let err = canonicalize(&reg).unwrap_err();
        assert!(err.to_string().contains("does not use any packages"));
        assert!(err.to_string().contains("base"));
    }

    #[test]
    fn test_package_prefix_mismatch_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let conf = "suite=demo\n\
             project@app@sourceDirs=src\n\
             project@app@javaCompliance=1.8\n\
             project@app@dependencies=\n";
        std::fs::write(tmp.path().join("suite.conf"), conf).unwrap();

        write_source(
            &tmp.path().join("app/src"),
            "rogue.pkg",
            "Main",
            "package rogue.pkg;\npublic class Main {}\n",
        );

        let mut reg = Registry::new();
        reg.load_suite(tmp.path()).unwrap();

        let err = canonicalize(&reg).unwrap_err();
        assert!(err.to_string().contains("does not have prefix"));
    }
}
