//! Registry - the aggregated universe of loaded suites.
//!
//! Unlike a module-level global, the registry is an explicit object passed
//! by reference to the graph, orchestrator and packager, so tests can
//! build several independent universes in one process.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::config::{self, split_list, ConfigError, RawEntity, RawSuite};
use crate::core::{Distribution, EntityRef, Library, Project, Suite};
use crate::util::fs::make_absolute;

/// Process-wide registry of suites, projects, libraries and
/// distributions. Names are unique across all loaded suites.
#[derive(Debug, Default)]
pub struct Registry {
    suites: Vec<Suite>,
    projects: BTreeMap<String, Project>,
    libraries: BTreeMap<String, Library>,
    distributions: BTreeMap<String, Distribution>,

    /// Project names excluded from this run; depending on one is fatal.
    ignored: BTreeSet<String>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Mark project names as ignored for this run.
    pub fn set_ignored(&mut self, names: impl IntoIterator<Item = String>) {
        self.ignored = names.into_iter().collect();
    }

    /// Whether `name` is on the ignored-project list.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    /// Load the suite at `dir` (and, recursively, its includes first).
    ///
    /// Loading is idempotent per directory; the suite name is returned.
    pub fn load_suite(&mut self, dir: &Path) -> Result<String> {
        let mut stack = Vec::new();
        self.load_suite_inner(dir, &mut stack)
    }

    fn load_suite_inner(&mut self, dir: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("suite directory not found: {}", dir.display()))?;

        if let Some(existing) = self.suites.iter().find(|s| s.dir() == dir) {
            return Ok(existing.name().to_string());
        }
        if stack.contains(&dir) {
            let cycle: Vec<String> = stack.iter().map(|d| d.display().to_string()).collect();
            bail!(
                "circular suite includes: {} -> {}",
                cycle.join(" -> "),
                dir.display()
            );
        }
        stack.push(dir.clone());

        let conf = dir.join("suite.conf");
        let raw = config::parse_suite_file(&conf)?;

        self.check_tool_version(&raw, &conf)?;
        self.load_env_file(&dir)?;

        for include in &raw.includes {
            self.load_suite_inner(&dir.join(include), stack)?;
        }

        let tool_version = raw
            .tool_version
            .as_deref()
            .map(Version::parse)
            .transpose()
            .with_context(|| format!("invalid toolVersion in {}", conf.display()))?;
        let mut suite = Suite::new(raw.name.clone(), dir.clone(), tool_version, raw.includes.clone());
        if let Some(rev) = suite.revision() {
            tracing::debug!("suite {} at revision {}", suite.name(), rev);
        }

        for entity in &raw.libraries {
            let library = build_library(&raw.name, entity, &conf)?;
            suite.record_library(library.name().to_string());
            self.add_library(library)?;
        }
        for entity in &raw.projects {
            let project = build_project(&raw.name, entity, &dir, &conf)?;
            suite.record_project(project.name().to_string());
            if self.is_ignored(project.name()) {
                tracing::debug!("skipping ignored project {}", project.name());
                continue;
            }
            project.materialize()?;
            self.add_project(project)?;
        }
        for entity in &raw.distributions {
            let dist = build_distribution(&raw.name, entity, &dir, &conf)?;
            suite.record_distribution(dist.name().to_string());
            self.add_distribution(dist)?;
        }

        self.suites.push(suite);
        stack.pop();
        Ok(raw.name)
    }

    fn check_tool_version(&self, raw: &RawSuite, conf: &Path) -> Result<()> {
        let Some(ref required) = raw.tool_version else {
            return Ok(());
        };
        let required = Version::parse(required)
            .with_context(|| format!("invalid toolVersion in {}", conf.display()))?;
        let current = Version::parse(env!("CARGO_PKG_VERSION")).expect("crate version is semver");
        if required > current {
            bail!(
                "suite {} requires drydock version {} but this is {}; please update drydock",
                raw.name,
                required,
                current
            );
        }
        Ok(())
    }

    /// Apply the suite's optional `env` file to the process environment.
    fn load_env_file(&self, dir: &Path) -> Result<()> {
        let env_file = dir.join("env");
        if !env_file.exists() {
            return Ok(());
        }
        let content = crate::util::fs::read_to_string(&env_file)?;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!(
                    "{}:{}: line does not match pattern \"key=value\"",
                    env_file.display(),
                    idx + 1
                );
            };
            std::env::set_var(key.trim(), value.trim());
        }
        Ok(())
    }

    /// Register a project; a name collision is a hard error.
    pub fn add_project(&mut self, project: Project) -> Result<()> {
        if let Some(existing) = self.projects.get(project.name()) {
            bail!(
                "cannot override project {} in {} with project of the same name in {}",
                project.name(),
                existing.dir().display(),
                project.dir().display()
            );
        }
        self.projects.insert(project.name().to_string(), project);
        Ok(())
    }

    /// Register a library; redefinition is tolerated only when both
    /// definitions describe the same artifact.
    pub fn add_library(&mut self, library: Library) -> Result<()> {
        if let Some(existing) = self.libraries.get(library.name()) {
            if !existing.same_artifact(&library) {
                bail!(
                    "inconsistent library redefinition of {} in suite {} and suite {}",
                    library.name(),
                    existing.suite(),
                    library.suite()
                );
            }
        }
        self.libraries.insert(library.name().to_string(), library);
        Ok(())
    }

    /// Register a distribution; redefinition keeps the original archive
    /// path and is only a warning.
    pub fn add_distribution(&mut self, mut dist: Distribution) -> Result<()> {
        if let Some(existing) = self.distributions.get(dist.name()) {
            tracing::warn!("distribution {} redefined", dist.name());
            dist.set_path(existing.path().to_path_buf());
        }
        self.distributions.insert(dist.name().to_string(), dist);
        Ok(())
    }

    /// Register an already-built suite (used by tests that assemble a
    /// registry without configuration files).
    pub fn add_suite(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    /// Look up a project by name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Look up a library by name.
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    /// Look up a distribution by name.
    pub fn distribution(&self, name: &str) -> Option<&Distribution> {
        self.distributions.get(name)
    }

    /// Mutable access to a distribution (listener registration).
    pub fn distribution_mut(&mut self, name: &str) -> Option<&mut Distribution> {
        self.distributions.get_mut(name)
    }

    /// Look up a project-or-library dependency by name.
    pub fn dependency(&self, name: &str) -> Option<EntityRef<'_>> {
        if let Some(p) = self.projects.get(name) {
            return Some(EntityRef::Project(p));
        }
        if let Some(l) = self.libraries.get(name) {
            return Some(EntityRef::Library(l));
        }
        None
    }

    /// All projects, name-ordered.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// All libraries, name-ordered.
    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    /// All distributions, name-ordered.
    pub fn distributions(&self) -> impl Iterator<Item = &Distribution> {
        self.distributions.values()
    }

    /// All loaded suites, in load order.
    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Look up a suite by name.
    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name() == name)
    }

    /// The directory of the suite owning `suite_name`, or "." when the
    /// suite was never registered (programmatic registries in tests).
    pub fn suite_dir(&self, suite_name: &str) -> PathBuf {
        self.suite(suite_name)
            .map(|s| s.dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn build_project(
    suite_name: &str,
    entity: &RawEntity,
    suite_dir: &Path,
    conf: &Path,
) -> Result<Project> {
    let mut attrs = entity.attrs.clone();
    let src_dirs = split_list(&attrs.remove("sourceDirs").unwrap_or_default());
    let deps = split_list(&attrs.remove("dependencies").unwrap_or_default());
    let processors = split_list(&attrs.remove("annotationProcessors").unwrap_or_default());
    let compliance = attrs
        .remove("javaCompliance")
        .map(|v| v.parse())
        .transpose()
        .with_context(|| format!("{}: project {}", conf.display(), entity.name))?;
    let native = attrs.remove("native").as_deref() == Some("true");
    let sub_dir = attrs.remove("subDir");
    let working_sets = split_list(&attrs.remove("workingSets").unwrap_or_default());
    let checkstyle = attrs.remove("checkstyle");
    let processor_for_dependents =
        attrs.remove("annotationProcessorForDependents").as_deref() == Some("true");

    if !native && compliance.is_none() {
        bail!(
            "{}:{}: javaCompliance property required for non-native project {}",
            conf.display(),
            entity.line,
            entity.name
        );
    }

    let dir = match sub_dir {
        Some(sub) => suite_dir.join(sub).join(&entity.name),
        None => suite_dir.join(&entity.name),
    };

    let mut project = Project::new(
        suite_name,
        entity.name.clone(),
        dir,
        src_dirs,
        deps,
        compliance,
        native,
    );
    if let Some(checkstyle) = checkstyle {
        project.set_checkstyle_proj(checkstyle);
    }
    project.set_working_sets(working_sets);
    project.set_declared_processors(processors);
    project.set_processor_for_dependents(processor_for_dependents);
    project.set_extra(attrs);
    Ok(project)
}

fn build_library(suite_name: &str, entity: &RawEntity, conf: &Path) -> Result<Library> {
    let mut attrs = entity.attrs.clone();
    let path = attrs.remove("path").ok_or_else(|| ConfigError::MissingAttribute {
        file: conf.display().to_string(),
        line: entity.line,
        kind: "library",
        name: entity.name.clone(),
        attr: "path",
    })?;
    let optional = attrs.remove("optional").as_deref() == Some("true");
    let urls = split_list(&attrs.remove("urls").unwrap_or_default());
    let sha256 = attrs.remove("sha256");
    let source_path = attrs.remove("sourcePath");
    let source_urls = split_list(&attrs.remove("sourceUrls").unwrap_or_default());
    let source_sha256 = attrs.remove("sourceSha256");
    let deps = split_list(&attrs.remove("dependencies").unwrap_or_default());

    let mut library = Library::new(
        suite_name,
        entity.name.clone(),
        path,
        optional,
        urls,
        sha256,
        source_path,
        source_urls,
        source_sha256,
        deps,
    )?;
    library.set_extra(attrs);
    Ok(library)
}

fn build_distribution(
    suite_name: &str,
    entity: &RawEntity,
    suite_dir: &Path,
    conf: &Path,
) -> Result<Distribution> {
    let mut attrs = entity.attrs.clone();
    let path = attrs.remove("path").ok_or_else(|| ConfigError::MissingAttribute {
        file: conf.display().to_string(),
        line: entity.line,
        kind: "distribution",
        name: entity.name.clone(),
        attr: "path",
    })?;
    let path = make_absolute(Path::new(&path), suite_dir);
    let sources_path = attrs
        .remove("sourcesPath")
        .map(|p| make_absolute(Path::new(&p), suite_dir));
    let deps = split_list(&attrs.remove("dependencies").unwrap_or_default());
    let excludes = split_list(&attrs.remove("exclude").unwrap_or_default());
    let dist_deps = split_list(&attrs.remove("distDependencies").unwrap_or_default());

    let mut dist = Distribution::new(
        suite_name,
        entity.name.clone(),
        path,
        sources_path,
        deps,
        excludes,
        dist_deps,
    );
    dist.set_extra(attrs);
    Ok(dist)
}
