//! Distribution archive packaging.
//!
//! Materializes a distribution's dependency closure into one zip archive.
//! Entries under `META-INF/services/` are never copied directly: their
//! content is accumulated per service name and flushed once at the end,
//! because several constituents may register providers for the same
//! service and an overwrite would silently drop registrations. Project
//! output may also carry `META-INF/providers/` files (one file per
//! provider implementation, one service name per line), which are folded
//! into the same accumulation.
//!
//! Archives are written to a temporary file in the destination directory
//! and renamed over the final path, so a reader never observes a
//! partially-written archive.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::builder::Toolchain;
use crate::core::{Distribution, Library, Project, Registry};
use crate::graph;

const SERVICES_DIR: &str = "META-INF/services";
const PROVIDERS_DIR: &str = "META-INF/providers";

/// A zip archive being written atomically.
pub struct Archiver {
    path: PathBuf,
    writer: ZipWriter<NamedTempFile>,
    /// arcname -> source, for duplicate-path warnings
    provenance: HashMap<String, String>,
}

impl Archiver {
    /// Start a new archive that will land at `path` on [`finish`].
    pub fn create(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        crate::util::fs::ensure_dir(parent)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let tmp = tempfile::Builder::new()
            .prefix(&format!("{}.", file_name))
            .tempfile_in(parent)
            .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
        Ok(Archiver {
            path: path.to_path_buf(),
            writer: ZipWriter::new(tmp),
            provenance: HashMap::new(),
        })
    }

    /// Entry options: deflate, fixed timestamp so unchanged inputs
    /// produce byte-identical archives.
    fn options() -> FileOptions {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
    }

    /// Write one entry, warning when a different source already supplied
    /// the same path (last writer wins).
    pub fn write_entry(&mut self, arcname: &str, data: &[u8], source: &str) -> Result<()> {
        if let Some(existing) = self.provenance.get(arcname) {
            if existing != source {
                tracing::warn!(
                    "{}: overwriting {}\n  new: {}\n  old: {}",
                    self.path.display(),
                    arcname,
                    source,
                    existing
                );
            }
        }
        self.provenance
            .insert(arcname.to_string(), source.to_string());

        self.writer
            .start_file(arcname, Self::options())
            .with_context(|| format!("failed to start archive entry {}", arcname))?;
        self.writer
            .write_all(data)
            .with_context(|| format!("failed to write archive entry {}", arcname))?;
        Ok(())
    }

    /// Close the archive and move it over the final path.
    pub fn finish(mut self) -> Result<()> {
        let tmp = self
            .writer
            .finish()
            .with_context(|| format!("failed to finalize {}", self.path.display()))?;
        let file = tmp
            .persist(&self.path)
            .with_context(|| format!("failed to move archive into place at {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(std::fs::Permissions::from_mode(0o644));
        }
        #[cfg(not(unix))]
        let _ = file;
        Ok(())
    }
}

/// Packages distributions from a registry's build outputs.
pub struct ArchivePackager<'a> {
    reg: &'a Registry,
    toolchain: Option<&'a Toolchain>,
}

impl<'a> ArchivePackager<'a> {
    pub fn new(reg: &'a Registry) -> Self {
        ArchivePackager {
            reg,
            toolchain: None,
        }
    }

    /// Gate Java projects on the toolchain's compliance level; without a
    /// toolchain every project is packaged.
    pub fn with_toolchain(mut self, toolchain: Option<&'a Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// The distribution's merge set: its dependency closure (libraries
    /// included), dependency-first, minus excluded entities.
    fn merge_order(&self, dist: &Distribution) -> Result<Vec<String>> {
        for excluded in dist.excludes() {
            if self.reg.dependency(excluded).is_none() {
                bail!(
                    "invalid excluded entity for {} distribution: {}",
                    dist.name(),
                    excluded
                );
            }
        }
        let order = graph::sorted_build_order(self.reg, Some(dist.deps()), true, false)?;
        Ok(order
            .into_iter()
            .filter(|name| !dist.excludes().contains(name))
            .collect())
    }

    /// Build (or rebuild) the distribution's archive, then notify its
    /// update listeners.
    pub fn make_archive(&self, dist: &Distribution) -> Result<()> {
        let order = self.merge_order(dist)?;
        let unified = dist.is_unified();

        let mut arc = Archiver::create(dist.path())?;
        let mut src_arc = match dist.sources_path() {
            Some(path) if !unified => Some(Archiver::create(path)?),
            _ => None,
        };

        // service name -> accumulated provider class names
        let mut services: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for name in &order {
            let entity = self
                .reg
                .dependency(name)
                .expect("merge order only yields registered entities");
            if let Some(library) = entity.as_library() {
                self.merge_library(library, &mut arc, &mut src_arc, unified, &mut services)?;
            } else if let Some(project) = entity.as_project() {
                self.merge_project(project, dist, &mut arc, &mut src_arc, unified, &mut services)?;
            }
        }

        for (service, providers) in &services {
            let arcname = format!("{}/{}", SERVICES_DIR, service);
            let content = providers.join("\n");
            arc.write_entry(&arcname, content.as_bytes(), "merged service registrations")?;
        }

        arc.finish()?;
        if let Some(src_arc) = src_arc {
            src_arc.finish()?;
        }

        dist.notify_updated();
        Ok(())
    }

    fn merge_library(
        &self,
        library: &Library,
        arc: &mut Archiver,
        src_arc: &mut Option<Archiver>,
        unified: bool,
        services: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        let suite_dir = self.reg.suite_dir(library.suite());
        let lpath = library.path(&suite_dir, true)?;
        if !lpath.exists() {
            tracing::debug!(
                "skipping absent optional library {} ({})",
                library.name(),
                lpath.display()
            );
            return Ok(());
        }

        tracing::debug!("[{}: adding library {}]", arc.path.display(), library.name());
        let file = std::fs::File::open(&lpath)
            .with_context(|| format!("failed to open {}", lpath.display()))?;
        let mut zip = ZipArchive::new(file)
            .with_context(|| format!("failed to read archive {}", lpath.display()))?;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let arcname = entry.name().to_string();
            if arcname.ends_with('/') {
                continue;
            }
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;

            match service_name(&arcname) {
                Some(service) => {
                    let providers = services.entry(service.to_string()).or_default();
                    providers.extend(text_lines(&data));
                }
                None => {
                    let source = format!("{}!{}", lpath.display(), arcname);
                    arc.write_entry(&arcname, &data, &source)?;
                }
            }
        }

        // Companion source jar, merged without the services special case.
        if unified || src_arc.is_some() {
            if let Some(source_jar) = library.source_path(&suite_dir, true)? {
                if source_jar.exists() {
                    let target = if unified { arc } else { src_arc.as_mut().unwrap() };
                    let file = std::fs::File::open(&source_jar)
                        .with_context(|| format!("failed to open {}", source_jar.display()))?;
                    let mut zip = ZipArchive::new(file)
                        .with_context(|| format!("failed to read archive {}", source_jar.display()))?;
                    for i in 0..zip.len() {
                        let mut entry = zip.by_index(i)?;
                        let arcname = entry.name().to_string();
                        if arcname.ends_with('/') {
                            continue;
                        }
                        let mut data = Vec::new();
                        entry.read_to_end(&mut data)?;
                        let source = format!("{}!{}", source_jar.display(), arcname);
                        target.write_entry(&arcname, &data, &source)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn merge_project(
        &self,
        project: &Project,
        dist: &Distribution,
        arc: &mut Archiver,
        src_arc: &mut Option<Archiver>,
        unified: bool,
        services: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        if let Some(toolchain) = self.toolchain {
            if !toolchain.supports(project.compliance()) {
                let level = project
                    .compliance()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                tracing::info!(
                    "excluding {} from {} (Java compliance level {} required)",
                    project.name(),
                    dist.path().display(),
                    level
                );
                return Ok(());
            }
        }
        let Some(output_dir) = project.output_dir() else {
            tracing::warn!(
                "distribution {} names native project {}; nothing to merge",
                dist.name(),
                project.name()
            );
            return Ok(());
        };
        if !output_dir.exists() {
            tracing::debug!("no build output for {} yet", project.name());
            return Ok(());
        }

        tracing::debug!("[{}: adding project {}]", arc.path.display(), project.name());
        for entry in walkdir::WalkDir::new(&output_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let rel = crate::util::fs::relative_path(&output_dir, entry.path());
            let rel_dir = rel
                .parent()
                .map(|p| slash_join(p))
                .unwrap_or_default();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let data = std::fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;

            if rel_dir == SERVICES_DIR {
                let providers = services.entry(file_name).or_default();
                providers.extend(text_lines(&data));
            } else if rel_dir == PROVIDERS_DIR {
                // Inverted form: file named for the provider, lines
                // naming the services it implements.
                for service in text_lines(&data) {
                    services.entry(service).or_default().push(file_name.clone());
                }
            } else {
                let arcname = slash_join(&rel);
                arc.write_entry(&arcname, &data, &entry.path().display().to_string())?;
            }
        }

        if unified || src_arc.is_some() {
            let target = if unified { arc } else { src_arc.as_mut().unwrap() };
            let mut source_dirs = project.source_dirs();
            if let Some(gen) = project.source_gen_dir() {
                source_dirs.push(gen);
            }
            for source_dir in source_dirs {
                if !source_dir.exists() {
                    continue;
                }
                for entry in walkdir::WalkDir::new(&source_dir)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().is_some_and(|x| x == "java"))
                {
                    let rel = crate::util::fs::relative_path(&source_dir, entry.path());
                    let data = std::fs::read(entry.path())?;
                    let arcname = slash_join(&rel);
                    target.write_entry(&arcname, &data, &entry.path().display().to_string())?;
                }
            }
        }
        Ok(())
    }
}

/// Archive a single project's compiled output into a jar next to the
/// project directory (or at `path` when given).
pub fn make_project_archive(project: &Project, path: Option<&Path>) -> Result<PathBuf> {
    let output_dir = project
        .output_dir()
        .with_context(|| format!("native project {} has no archive output", project.name()))?;
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => project.dir().join(format!("{}.jar", project.name())),
    };

    let mut arc = Archiver::create(&path)?;
    for entry in walkdir::WalkDir::new(&output_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let rel = crate::util::fs::relative_path(&output_dir, entry.path());
        let data = std::fs::read(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        arc.write_entry(&slash_join(&rel), &data, &entry.path().display().to_string())?;
    }
    arc.finish()?;
    Ok(path)
}

/// The service name when `arcname` is a direct child of the reserved
/// services directory.
fn service_name(arcname: &str) -> Option<&str> {
    let rest = arcname.strip_prefix("META-INF/services/")?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

/// Non-empty trimmed lines of a text file's bytes.
fn text_lines(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Join path components with forward slashes for archive entry names.
fn slash_join(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
