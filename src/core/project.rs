//! Project - a buildable unit of Java or native source.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::core::compliance::JavaCompliance;
use crate::core::registry::Registry;
use crate::graph::{transitive_closure, ClosureOptions};

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"import\s+(?:static\s+)?([^;]+?)\s*;").unwrap());

/// Java package sets derived from a project's sources.
///
/// Computed once per process and cached on the project.
#[derive(Debug, Clone, Default)]
pub struct JavaPackages {
    /// Packages defined by this project's own sources
    pub defined: BTreeSet<String>,

    /// Packages this project re-opens that a dependency already defines
    pub extended: BTreeSet<String>,

    /// Packages defined elsewhere that this project's sources import
    pub imported: BTreeSet<String>,
}

/// A unit of compilable source with declared dependencies.
#[derive(Debug)]
pub struct Project {
    name: String,
    suite: String,

    /// Project root directory
    dir: PathBuf,

    /// Source directory names relative to `dir`, in declaration order
    src_dirs: Vec<String>,

    /// Declared dependency names (projects or libraries), in order
    deps: Vec<String>,

    /// Minimum language level; required unless `native`
    compliance: Option<JavaCompliance>,

    native: bool,

    /// Project supplying the style-check configuration (defaults to self)
    checkstyle_proj: String,

    /// IDE grouping labels
    working_sets: Vec<String>,

    /// Explicitly declared annotation-processor names
    declared_processors: Vec<String>,

    /// When set, this project injects itself as an annotation processor
    /// into every project that depends on it
    processor_for_dependents: bool,

    /// Passthrough attributes not recognized by the loader
    extra: BTreeMap<String, String>,

    packages: OnceLock<JavaPackages>,
    processors: OnceLock<Vec<String>>,
}

impl Project {
    /// Create a project rooted at `dir`.
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        dir: PathBuf,
        src_dirs: Vec<String>,
        deps: Vec<String>,
        compliance: Option<JavaCompliance>,
        native: bool,
    ) -> Self {
        let name = name.into();
        Project {
            checkstyle_proj: name.clone(),
            name,
            suite: suite.into(),
            dir,
            src_dirs,
            deps,
            compliance,
            native,
            working_sets: Vec::new(),
            declared_processors: Vec::new(),
            processor_for_dependents: false,
            extra: BTreeMap::new(),
            packages: OnceLock::new(),
            processors: OnceLock::new(),
        }
    }

    /// The project's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning suite's name.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// The project root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Declared dependency names, in declaration order.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Minimum language-compliance level, if declared.
    pub fn compliance(&self) -> Option<JavaCompliance> {
        self.compliance
    }

    /// Whether this project builds with the native build tool.
    pub fn is_native(&self) -> bool {
        self.native
    }

    /// The project supplying style-check configuration.
    pub fn checkstyle_proj(&self) -> &str {
        &self.checkstyle_proj
    }

    pub fn set_checkstyle_proj(&mut self, name: impl Into<String>) {
        self.checkstyle_proj = name.into();
    }

    /// IDE working-set labels.
    pub fn working_sets(&self) -> &[String] {
        &self.working_sets
    }

    pub fn set_working_sets(&mut self, sets: Vec<String>) {
        self.working_sets = sets;
    }

    /// Explicitly declared annotation-processor names.
    pub fn declared_processors(&self) -> &[String] {
        &self.declared_processors
    }

    pub fn set_declared_processors(&mut self, processors: Vec<String>) {
        self.declared_processors = processors;
    }

    /// Whether this project self-declares as a processor for dependents.
    pub fn is_processor_for_dependents(&self) -> bool {
        self.processor_for_dependents
    }

    pub fn set_processor_for_dependents(&mut self, flag: bool) {
        self.processor_for_dependents = flag;
    }

    /// Attach passthrough attributes.
    pub fn set_extra(&mut self, extra: BTreeMap<String, String>) {
        self.extra = extra;
    }

    /// Passthrough attributes preserved from the suite configuration.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Absolute source directories, in declaration order.
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        self.src_dirs.iter().map(|s| self.dir.join(s)).collect()
    }

    /// Directory for sources emitted by annotation processors.
    pub fn source_gen_dir(&self) -> Option<PathBuf> {
        if self.native {
            None
        } else {
            Some(self.dir.join("src_gen"))
        }
    }

    /// Directory holding this project's compiled class files.
    pub fn output_dir(&self) -> Option<PathBuf> {
        if self.native {
            None
        } else {
            Some(self.dir.join("bin"))
        }
    }

    /// Create the project and source directories if absent.
    pub fn materialize(&self) -> Result<()> {
        crate::util::fs::ensure_dir(&self.dir)?;
        for src in self.source_dirs() {
            crate::util::fs::ensure_dir(&src)?;
        }
        Ok(())
    }

    /// Packages defined by this project's own sources.
    pub fn defined_packages(&self, reg: &Registry) -> Result<&BTreeSet<String>> {
        Ok(&self.java_packages(reg)?.defined)
    }

    /// Packages this project re-opens over a dependency's definition.
    pub fn extended_packages(&self, reg: &Registry) -> Result<&BTreeSet<String>> {
        Ok(&self.java_packages(reg)?.extended)
    }

    /// Packages defined by dependencies that this project imports.
    pub fn imported_packages(&self, reg: &Registry) -> Result<&BTreeSet<String>> {
        Ok(&self.java_packages(reg)?.imported)
    }

    /// The derived package sets, computed on first use.
    pub fn java_packages(&self, reg: &Registry) -> Result<&JavaPackages> {
        if let Some(cached) = self.packages.get() {
            return Ok(cached);
        }
        let computed = self.scan_packages(reg)?;
        Ok(self.packages.get_or_init(|| computed))
    }

    fn scan_packages(&self, reg: &Registry) -> Result<JavaPackages> {
        // Packages defined by any transitive project dependency.
        let mut dep_packages = BTreeSet::new();
        let closure = transitive_closure(
            reg,
            &self.name,
            ClosureOptions {
                include_libs: false,
                include_self: false,
                include_processors: false,
            },
        )?;
        for dep_name in &closure {
            if let Some(dep) = reg.project(dep_name) {
                dep_packages.extend(dep.defined_packages(reg)?.iter().cloned());
            }
        }

        let mut packages = JavaPackages::default();
        let mut imports: BTreeSet<String> = BTreeSet::new();
        for source_dir in self.source_dirs() {
            if !source_dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&source_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
            {
                let java_sources: Vec<PathBuf> = std::fs::read_dir(entry.path())
                    .with_context(|| format!("failed to read {}", entry.path().display()))?
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|e| e == "java"))
                    .collect();
                if java_sources.is_empty() {
                    continue;
                }

                let rel = crate::util::fs::relative_path(&source_dir, entry.path());
                let pkg = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(".");
                if dep_packages.contains(&pkg) {
                    // Re-opens a package already defined by a dependency.
                    packages.extended.insert(pkg.clone());
                    imports.insert(pkg);
                } else {
                    packages.defined.insert(pkg);
                }

                for source in java_sources {
                    let content = crate::util::fs::read_to_string(&source)?;
                    for cap in IMPORT_RE.captures_iter(&content) {
                        imports.insert(cap[1].to_string());
                    }
                }
            }
        }

        // An import names a type or a wildcard; strip trailing segments
        // until a dependency-defined package remains.
        for import in imports {
            let mut name = import.as_str();
            loop {
                if dep_packages.contains(name) {
                    packages.imported.insert(name.to_string());
                    break;
                }
                match name.rfind('.') {
                    Some(dot) => name = &name[..dot],
                    None => break,
                }
            }
        }

        Ok(packages)
    }

    /// The resolved annotation-processor list: explicitly declared
    /// processors plus any transitive project dependency that
    /// self-declares as a processor for its dependents. Computed once.
    pub fn annotation_processors(&self, reg: &Registry) -> Result<&[String]> {
        if let Some(cached) = self.processors.get() {
            return Ok(cached);
        }
        let mut ap: BTreeSet<String> = self.declared_processors.iter().cloned().collect();
        let closure = transitive_closure(
            reg,
            &self.name,
            ClosureOptions {
                include_libs: false,
                include_self: false,
                include_processors: false,
            },
        )?;
        for dep_name in &closure {
            if let Some(dep) = reg.project(dep_name) {
                if dep.is_processor_for_dependents() {
                    ap.insert(dep.name().to_string());
                }
            }
        }
        let computed: Vec<String> = ap.into_iter().collect();
        Ok(self.processors.get_or_init(|| computed))
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Project {}

impl std::hash::Hash for Project {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &Path, pkg: &str, class: &str, content: &str) {
        let pkg_dir = dir.join(pkg.replace('.', "/"));
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join(format!("{}.java", class)), content).unwrap();
    }

    #[test]
    fn test_defined_and_imported_packages() {
        let tmp = TempDir::new().unwrap();
        let mut reg = Registry::new();

        let base_dir = tmp.path().join("base");
        write_source(
            &base_dir.join("src"),
            "base.util",
            "Strings",
            "package base.util;\npublic class Strings {}\n",
        );
        reg.add_project(Project::new(
            "demo",
            "base",
            base_dir,
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let app_dir = tmp.path().join("app");
        write_source(
            &app_dir.join("src"),
            "app.main",
            "Main",
            "package app.main;\nimport base.util.Strings;\npublic class Main {}\n",
        );
        reg.add_project(Project::new(
            "app",
            "app",
            app_dir,
            vec!["src".into()],
            vec!["base".into()],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let base = reg.project("base").unwrap();
        assert!(base.defined_packages(&reg).unwrap().contains("base.util"));

        let app = reg.project("app").unwrap();
        assert!(app.defined_packages(&reg).unwrap().contains("app.main"));
        assert!(app.imported_packages(&reg).unwrap().contains("base.util"));
        assert!(app.extended_packages(&reg).unwrap().is_empty());
    }

    #[test]
    fn test_extended_package_detection() {
        let tmp = TempDir::new().unwrap();
        let mut reg = Registry::new();

        let core_dir = tmp.path().join("core");
        write_source(
            &core_dir.join("src"),
            "shared.api",
            "Api",
            "package shared.api;\npublic class Api {}\n",
        );
        reg.add_project(Project::new(
            "demo",
            "core",
            core_dir,
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let ext_dir = tmp.path().join("ext");
        write_source(
            &ext_dir.join("src"),
            "shared.api",
            "ApiImpl",
            "package shared.api;\npublic class ApiImpl {}\n",
        );
        reg.add_project(Project::new(
            "demo",
            "ext",
            ext_dir,
            vec!["src".into()],
            vec!["core".into()],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let ext = reg.project("ext").unwrap();
        assert!(ext.extended_packages(&reg).unwrap().contains("shared.api"));
        assert!(!ext.defined_packages(&reg).unwrap().contains("shared.api"));
    }

    #[test]
    fn test_auto_injected_annotation_processors() {
        let tmp = TempDir::new().unwrap();
        let mut reg = Registry::new();

        let mut gen = Project::new(
            "demo",
            "codegen",
            tmp.path().join("codegen"),
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        );
        gen.set_processor_for_dependents(true);
        reg.add_project(gen).unwrap();

        let mut user = Project::new(
            "demo",
            "user",
            tmp.path().join("user"),
            vec!["src".into()],
            vec!["codegen".into()],
            Some("1.8".parse().unwrap()),
            false,
        );
        user.set_declared_processors(vec!["verifier".into()]);
        reg.add_project(user).unwrap();

        reg.add_project(Project::new(
            "demo",
            "verifier",
            tmp.path().join("verifier"),
            vec!["src".into()],
            vec![],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        let user = reg.project("user").unwrap();
        let aps = user.annotation_processors(&reg).unwrap();
        assert_eq!(aps, &["codegen".to_string(), "verifier".to_string()]);
    }
}
