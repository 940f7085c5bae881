//! Library - an external, pre-built artifact dependency.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::download::{cached_digest, download, sha256_of_file, write_cached_digest};
use crate::util::fs::make_absolute;

/// A pre-built artifact (typically a jar) referenced by projects and
/// distributions, optionally downloadable from one or more sources.
#[derive(Debug, Clone)]
pub struct Library {
    name: String,
    suite: String,

    /// Declared artifact location, relative to the suite directory unless
    /// absolute. A trailing separator marks a directory-style entry.
    path: String,

    /// When true, absence of the artifact is tolerated.
    optional: bool,

    /// Download sources, tried in order.
    urls: Vec<String>,

    /// Pinned artifact digest (hex SHA-256), if any.
    sha256: Option<String>,

    /// Companion source archive, same semantics as `path`/`urls`.
    source_path: Option<String>,
    source_urls: Vec<String>,
    source_sha256: Option<String>,

    deps: Vec<String>,

    /// Passthrough attributes not recognized by the loader.
    extra: BTreeMap<String, String>,
}

impl Library {
    /// Create a library, validating the directory-style path/URL
    /// invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        optional: bool,
        urls: Vec<String>,
        sha256: Option<String>,
        source_path: Option<String>,
        source_urls: Vec<String>,
        source_sha256: Option<String>,
        deps: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        let path_is_dir = path.ends_with('/') || path.ends_with(std::path::MAIN_SEPARATOR);
        for url in &urls {
            if url.ends_with('/') != path_is_dir {
                bail!(
                    "library {}: a directory-style path requires URLs ending with \"/\": path={} url={}",
                    name,
                    path,
                    url
                );
            }
        }

        Ok(Library {
            name,
            suite: suite.into(),
            path,
            optional,
            urls,
            sha256,
            source_path,
            source_urls,
            source_sha256,
            deps,
            extra: BTreeMap::new(),
        })
    }

    /// The library's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning suite's name.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Names of libraries this one depends on.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Whether absence of the artifact is tolerated.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The declared (unresolved) path.
    pub fn declared_path(&self) -> &str {
        &self.path
    }

    /// Attach passthrough attributes.
    pub fn set_extra(&mut self, extra: BTreeMap<String, String>) {
        self.extra = extra;
    }

    /// Passthrough attributes preserved from the suite configuration.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Whether two definitions of this library name describe the same
    /// artifact. Libraries with download sources compare by URL list,
    /// otherwise by path.
    pub fn same_artifact(&self, other: &Library) -> bool {
        if self.urls.is_empty() {
            self.path == other.path
        } else {
            self.urls == other.urls
        }
    }

    /// Resolve the artifact path against `suite_dir`.
    ///
    /// With `resolve` set, a missing required artifact is downloaded from
    /// the declared sources and its digest verified when one is pinned.
    /// The returned path may still not exist for optional libraries.
    pub fn path(&self, suite_dir: &Path, resolve: bool) -> Result<PathBuf> {
        let path = make_absolute(Path::new(&self.path), suite_dir);
        self.materialize(&path, &self.urls, self.sha256.as_deref(), resolve, !self.optional)?;
        Ok(path)
    }

    /// Resolve the companion source archive, if one is declared.
    pub fn source_path(&self, suite_dir: &Path, resolve: bool) -> Result<Option<PathBuf>> {
        let Some(ref declared) = self.source_path else {
            return Ok(None);
        };
        let path = make_absolute(Path::new(declared), suite_dir);
        let must_exist = !self.source_urls.is_empty();
        self.materialize(
            &path,
            &self.source_urls,
            self.source_sha256.as_deref(),
            resolve,
            must_exist,
        )?;
        Ok(Some(path))
    }

    fn materialize(
        &self,
        path: &Path,
        urls: &[String],
        sha256: Option<&str>,
        resolve: bool,
        must_exist: bool,
    ) -> Result<()> {
        if resolve && must_exist && !path.exists() {
            if urls.is_empty() {
                bail!(
                    "cannot find required library {} at {}",
                    self.name,
                    path.display()
                );
            }
            download(path, urls)?;
        }

        let Some(expected) = sha256 else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let digest_path = PathBuf::from(format!("{}.sha256", path.display()));
        if cached_digest(&digest_path).is_none() {
            write_cached_digest(&digest_path, &sha256_of_file(path)?)?;
        }
        if cached_digest(&digest_path).as_deref() != Some(expected) {
            download(path, urls)?;
            let actual = sha256_of_file(path)?;
            if actual != expected {
                bail!(
                    "SHA-256 does not match for {}: expected {}, got {}. Broken download, or digest not updated in the suite file?",
                    self.name,
                    expected,
                    actual
                );
            }
            write_cached_digest(&digest_path, &actual)?;
        }
        Ok(())
    }
}

impl PartialEq for Library {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Library {}

impl std::hash::Hash for Library {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lib(path: &str, urls: Vec<String>) -> Result<Library> {
        Library::new(
            "demo", "JUNIT", path, false, urls, None, None, vec![], None, vec![],
        )
    }

    #[test]
    fn test_directory_url_invariant() {
        assert!(lib("lib/junit.jar", vec!["https://repo/junit.jar".into()]).is_ok());
        assert!(lib("lib/findbugs/", vec!["https://repo/findbugs/".into()]).is_ok());

        let err = lib("lib/findbugs/", vec!["https://repo/findbugs.zip".into()]).unwrap_err();
        assert!(err.to_string().contains("directory-style"));
    }

    #[test]
    fn test_path_resolution_without_resolve() {
        let tmp = TempDir::new().unwrap();
        let l = lib("lib/junit.jar", vec![]).unwrap();

        let path = l.path(tmp.path(), false).unwrap();
        assert_eq!(path, tmp.path().join("lib/junit.jar"));
    }

    #[test]
    fn test_missing_required_library_without_urls() {
        let tmp = TempDir::new().unwrap();
        let l = lib("lib/junit.jar", vec![]).unwrap();

        let err = l.path(tmp.path(), true).unwrap_err();
        assert!(err.to_string().contains("cannot find required library"));
    }

    #[test]
    fn test_optional_library_absence_tolerated() {
        let tmp = TempDir::new().unwrap();
        let l = Library::new(
            "demo", "JFR", "lib/jfr.jar", true, vec![], None, None, vec![], None, vec![],
        )
        .unwrap();

        let path = l.path(tmp.path(), true).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_same_artifact() {
        let a = lib("lib/junit.jar", vec!["https://repo/junit.jar".into()]).unwrap();
        let b = lib("other/junit.jar", vec!["https://repo/junit.jar".into()]).unwrap();
        let c = lib("lib/junit.jar", vec![]).unwrap();
        let d = lib("lib/junit.jar", vec![]).unwrap();

        assert!(a.same_artifact(&b));
        assert!(c.same_artifact(&d));
        assert!(!c.same_artifact(&lib("other/junit.jar", vec![]).unwrap()));
    }
}
