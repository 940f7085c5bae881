//! Distribution - a packaging unit producing one archive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Callback invoked after a distribution's archive is (re)written.
pub type UpdateListener = Box<dyn Fn(&Distribution) + Send + Sync>;

/// A named packaging unit merging projects and libraries into one
/// zip archive.
pub struct Distribution {
    name: String,
    suite: String,

    /// Absolute path of the produced archive
    path: PathBuf,

    /// Absolute path of the companion source archive, if any. Equal to
    /// `path` when sources are combined into the main archive.
    sources_path: Option<PathBuf>,

    /// Declared dependency names (projects and/or libraries)
    deps: Vec<String>,

    /// Entities whose content is not merged even when transitively
    /// reachable
    excludes: Vec<String>,

    /// Other distributions that must be packaged before this one
    dist_deps: Vec<String>,

    /// Passthrough attributes not recognized by the loader
    extra: BTreeMap<String, String>,

    listeners: Vec<UpdateListener>,
}

impl Distribution {
    /// Create a distribution; `path` and `sources_path` are resolved
    /// against the owning suite's directory by the caller.
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        path: PathBuf,
        sources_path: Option<PathBuf>,
        deps: Vec<String>,
        excludes: Vec<String>,
        dist_deps: Vec<String>,
    ) -> Self {
        Distribution {
            name: name.into(),
            suite: suite.into(),
            path,
            sources_path,
            deps,
            excludes,
            dist_deps,
            extra: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// The distribution's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning suite's name.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// The archive output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Override the archive path (used when a redefinition keeps the
    /// original definition's path).
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// The source-archive path, if sources are packaged.
    pub fn sources_path(&self) -> Option<&Path> {
        self.sources_path.as_deref()
    }

    /// Whether sources are combined into the main archive.
    pub fn is_unified(&self) -> bool {
        self.sources_path.as_deref() == Some(&self.path)
    }

    /// Declared dependency names.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Entities excluded from merging.
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Distributions that must be packaged before this one.
    pub fn dist_deps(&self) -> &[String] {
        &self.dist_deps
    }

    /// Attach passthrough attributes.
    pub fn set_extra(&mut self, extra: BTreeMap<String, String>) {
        self.extra = extra;
    }

    /// Passthrough attributes preserved from the suite configuration.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Register a callback to run after the archive is (re)written.
    pub fn add_update_listener(&mut self, listener: UpdateListener) {
        self.listeners.push(listener);
    }

    /// Invoke all registered update listeners.
    pub fn notify_updated(&self) {
        for listener in &self.listeners {
            listener(self);
        }
    }
}

impl std::fmt::Debug for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distribution")
            .field("name", &self.name)
            .field("suite", &self.suite)
            .field("path", &self.path)
            .field("sources_path", &self.sources_path)
            .field("deps", &self.deps)
            .field("excludes", &self.excludes)
            .field("dist_deps", &self.dist_deps)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Distribution {}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_update_listeners_all_invoked() {
        let mut dist = Distribution::new(
            "demo",
            "GRAAL",
            PathBuf::from("/out/graal.jar"),
            None,
            vec!["compiler".into()],
            vec![],
            vec![],
        );

        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = Arc::clone(&count);
            dist.add_update_listener(Box::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        dist.notify_updated();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unified_sources() {
        let unified = Distribution::new(
            "demo",
            "D",
            PathBuf::from("/out/d.jar"),
            Some(PathBuf::from("/out/d.jar")),
            vec![],
            vec![],
            vec![],
        );
        assert!(unified.is_unified());

        let split = Distribution::new(
            "demo",
            "E",
            PathBuf::from("/out/e.jar"),
            Some(PathBuf::from("/out/e-sources.jar")),
            vec![],
            vec![],
            vec![],
        );
        assert!(!split.is_unified());
    }
}
