//! Suite - a loadable scope of projects, libraries and distributions.

use std::path::{Path, PathBuf};

use semver::Version;

/// A loaded suite: one directory with a `suite.conf`, owning the entities
/// declared there plus the list of nested suites it includes.
#[derive(Debug)]
pub struct Suite {
    name: String,
    dir: PathBuf,

    /// Minimum drydock version the suite requires, if declared
    tool_version: Option<Version>,

    /// Directories of nested suites, loaded before this one
    includes: Vec<String>,

    /// Checked-out VCS revision of the suite directory, if known
    revision: Option<String>,

    /// Names of entities owned by this suite, in declaration order
    project_names: Vec<String>,
    library_names: Vec<String>,
    distribution_names: Vec<String>,
}

impl Suite {
    pub fn new(
        name: impl Into<String>,
        dir: PathBuf,
        tool_version: Option<Version>,
        includes: Vec<String>,
    ) -> Self {
        let revision = crate::util::vcs::short_revision(&dir);
        Suite {
            name: name.into(),
            dir,
            tool_version,
            includes,
            revision,
            project_names: Vec::new(),
            library_names: Vec::new(),
            distribution_names: Vec::new(),
        }
    }

    /// The suite's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The suite root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The suite configuration file.
    pub fn conf_path(&self) -> PathBuf {
        self.dir.join("suite.conf")
    }

    /// Directory for drydock bookkeeping inside the suite.
    pub fn state_dir(&self) -> PathBuf {
        self.dir.join(".drydock")
    }

    /// Minimum drydock version the suite requires.
    pub fn tool_version(&self) -> Option<&Version> {
        self.tool_version.as_ref()
    }

    /// Directories of nested suites.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Checked-out VCS revision, if the suite lives in a repository.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Names of projects owned by this suite, in declaration order.
    pub fn project_names(&self) -> &[String] {
        &self.project_names
    }

    pub(crate) fn record_project(&mut self, name: String) {
        self.project_names.push(name);
    }

    /// Names of libraries owned by this suite.
    pub fn library_names(&self) -> &[String] {
        &self.library_names
    }

    pub(crate) fn record_library(&mut self, name: String) {
        self.library_names.push(name);
    }

    /// Names of distributions owned by this suite.
    pub fn distribution_names(&self) -> &[String] {
        &self.distribution_names
    }

    pub(crate) fn record_distribution(&mut self, name: String) {
        self.distribution_names.push(name);
    }
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
