//! The build orchestrator.
//!
//! Walks projects in dependency-first order and decides, per project,
//! whether to rebuild: forced, upstream-was-rebuilt, stale class files,
//! or a changed annotation-processor set. Java projects are handed to the
//! external compiler; native projects to make. Distributions are
//! repackaged at the end.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::builder::javac::{CompileSpec, Toolchain};
use crate::builder::native::NativeBuilder;
use crate::builder::stamp::TimeStampFile;
use crate::core::{Project, Registry};
use crate::graph::{self, ClosureOptions};
use crate::packager::ArchivePackager;
use crate::util::fs::{copy_if_stale, ensure_dir, remove_dir_all_if_exists};
use crate::util::process::StreamLine;

/// Options for one orchestrator run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Rebuild everything regardless of timestamps
    pub force: bool,

    /// Wipe output directories before building
    pub clean: bool,

    /// Build Java projects
    pub java: bool,

    /// Build native projects
    pub native: bool,

    /// Root projects to build (all when None); dependencies are included
    pub projects: Option<Vec<String>>,

    /// Build exactly these projects, without dependency expansion
    pub only: Option<Vec<String>>,

    /// Compliance fallback for projects that declare none
    pub default_compliance: Option<crate::core::JavaCompliance>,

    /// Package all distributions after building
    pub archive: bool,

    /// Show a progress bar
    pub progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            force: false,
            clean: false,
            java: true,
            native: true,
            projects: None,
            only: None,
            default_compliance: None,
            archive: true,
            progress: false,
        }
    }
}

/// What one orchestrator run did.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Projects (re)built this run, in build order
    pub built: Vec<String>,

    /// Projects skipped, with the reason
    pub skipped: Vec<(String, String)>,

    /// Distributions repackaged
    pub archived: Vec<String>,
}

/// Drives the per-project build state machine.
pub struct Orchestrator<'a> {
    reg: &'a Registry,
    toolchain: Toolchain,
    opts: BuildOptions,
    timeout: Option<Duration>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(reg: &'a Registry, toolchain: Toolchain, opts: BuildOptions) -> Self {
        Orchestrator {
            reg,
            toolchain,
            opts,
            timeout: None,
        }
    }

    /// Apply a process-wide subprocess timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the build.
    pub fn build(&self) -> Result<BuildReport> {
        let ordered = self.ordered_projects()?;
        let mut report = BuildReport::default();
        let mut built: BTreeSet<String> = BTreeSet::new();

        let bar = if self.opts.progress && ordered.len() > 1 {
            let bar = ProgressBar::new(ordered.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let mut native_builder: Option<NativeBuilder> = None;
        for project in &ordered {
            if let Some(ref bar) = bar {
                bar.set_message(project.name().to_string());
            }
            self.build_one(project, &mut built, &mut report, &mut native_builder)?;
            if let Some(ref bar) = bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = bar {
            bar.finish_with_message("done");
        }

        if self.opts.archive {
            let packager = ArchivePackager::new(self.reg).with_toolchain(Some(&self.toolchain));
            for dist in graph::sorted_distributions(self.reg)? {
                packager.make_archive(dist)?;
                report.archived.push(dist.name().to_string());
            }
        }

        Ok(report)
    }

    fn ordered_projects(&self) -> Result<Vec<&'a Project>> {
        if let Some(ref only) = self.opts.only {
            // No dependency expansion, not even annotation processors.
            return only
                .iter()
                .map(|name| {
                    self.reg
                        .project(name)
                        .with_context(|| format!("project not found: {}", name))
                })
                .collect();
        }

        let order = graph::sorted_build_order(
            self.reg,
            self.opts.projects.as_deref(),
            false,
            true,
        )?;
        Ok(order
            .iter()
            .filter_map(|name| self.reg.project(name))
            .collect())
    }

    fn build_one(
        &self,
        project: &Project,
        built: &mut BTreeSet<String>,
        report: &mut BuildReport,
        native_builder: &mut Option<NativeBuilder>,
    ) -> Result<()> {
        if project.is_native() {
            if !self.opts.native {
                return Ok(());
            }
            if native_builder.is_none() {
                *native_builder = Some(NativeBuilder::new(self.timeout)?);
            }
            let builder = native_builder.as_ref().unwrap();
            tracing::info!("calling make for {}...", project.name());
            builder.build(project.dir(), self.opts.clean)?;
            built.insert(project.name().to_string());
            report.built.push(project.name().to_string());
            return Ok(());
        }
        if !self.opts.java {
            return Ok(());
        }

        let required = project.compliance().or(self.opts.default_compliance);
        if !self.toolchain.supports(required) {
            let level = required.map(|c| c.to_string()).unwrap_or_default();
            tracing::info!(
                "excluding {} from build (Java compliance level {} required)",
                project.name(),
                level
            );
            report
                .skipped
                .push((project.name().to_string(), format!("compliance {} required", level)));
            return Ok(());
        }

        let output_dir = project
            .output_dir()
            .expect("non-native project has an output dir");
        self.prepare_output_dirs(project, &output_dir)?;

        let classpath =
            graph::classpath(self.reg, Some(&[project.name().to_string()]), true, true)?;

        let mut build_reason: Option<String> = if self.opts.force {
            Some("forced build".to_string())
        } else {
            None
        };
        if build_reason.is_none() {
            let deps = graph::transitive_closure(
                self.reg,
                project.name(),
                ClosureOptions {
                    include_libs: false,
                    include_self: false,
                    include_processors: false,
                },
            )?;
            build_reason = deps
                .iter()
                .find(|d| built.contains(*d))
                .map(|d| format!("{} rebuilt", d));
        }

        let sources = self.scan_sources(project, &output_dir)?;
        if build_reason.is_none() {
            let stale = sources
                .par_iter()
                .any(|s| TimeStampFile::new(&s.class_file).is_older_than(&s.path));
            if stale {
                build_reason = Some("class file(s) out of date".to_string());
            }
        }

        let processors = project.annotation_processors(self.reg)?;
        let state_file = self
            .reg
            .suite_dir(project.suite())
            .join(".drydock")
            .join("processors")
            .join(project.name());
        if update_processor_state(&state_file, processors)? {
            build_reason = Some("annotation processor(s) changed".to_string());
        }

        let Some(reason) = build_reason else {
            tracing::debug!("[all class files for {} are up to date - skipping]", project.name());
            report
                .skipped
                .push((project.name().to_string(), "up to date".to_string()));
            return Ok(());
        };
        if sources.is_empty() {
            tracing::debug!("[no Java sources for {} - skipping]", project.name());
            return Ok(());
        }

        built.insert(project.name().to_string());
        report.built.push(project.name().to_string());

        let (processor_path, gen_dir) = if processors.is_empty() {
            (None, None)
        } else {
            let path = graph::classpath(self.reg, Some(processors), true, true)?;
            let gen = project
                .source_gen_dir()
                .expect("non-native project has a gen dir");
            remove_dir_all_if_exists(&gen)?;
            ensure_dir(&gen)?;
            (Some(path), Some(gen))
        };

        // Pass sources via an argument file to dodge command-line limits.
        let argfile = project.dir().join("javafilelist.txt");
        let listing: Vec<String> = sources
            .iter()
            .map(|s| s.path.display().to_string())
            .collect();
        crate::util::fs::write_string(&argfile, &listing.join("\n"))?;

        let result = self.invoke_compiler(
            project,
            &classpath,
            &output_dir,
            &argfile,
            required.unwrap_or_else(|| self.toolchain.compliance()),
            processor_path,
            gen_dir,
            &reason,
        );
        let _ = std::fs::remove_file(&argfile);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke_compiler(
        &self,
        project: &Project,
        classpath: &str,
        output_dir: &Path,
        argfile: &Path,
        compliance: crate::core::JavaCompliance,
        processor_path: Option<String>,
        gen_dir: Option<PathBuf>,
        reason: &str,
    ) -> Result<()> {
        let compiler = if self.toolchain.batch_jar().is_some() {
            "batch compiler"
        } else {
            "javac"
        };
        tracing::info!(
            "compiling Java sources for {} with {}... [{}]",
            project.name(),
            compiler,
            reason
        );

        let spec = CompileSpec {
            classpath,
            output_dir,
            argfile,
            compliance,
            processor_path,
            gen_dir,
        };
        let pb = self.toolchain.compile_command(&spec).timeout(self.timeout);
        let code = pb.run_streamed(|line| match line {
            StreamLine::Stdout(l) => tracing::info!(target: "javac", "{}", l),
            StreamLine::Stderr(l) => tracing::warn!(target: "javac", "{}", l),
        })?;
        if code != 0 {
            bail!(
                "compilation of {} failed with exit code {}",
                project.name(),
                code
            );
        }
        Ok(())
    }

    fn prepare_output_dirs(&self, project: &Project, output_dir: &Path) -> Result<()> {
        if output_dir.exists() && self.opts.clean {
            tracing::info!("cleaning {}...", output_dir.display());
            remove_dir_all_if_exists(output_dir)?;
        }
        ensure_dir(output_dir)?;
        if self.opts.clean {
            if let Some(gen) = project.source_gen_dir() {
                remove_dir_all_if_exists(&gen)?;
            }
        }
        Ok(())
    }

    /// Walk the project's source directories: collect Java sources for
    /// compilation and mirror every other file into the output tree when
    /// missing or stale.
    fn scan_sources(&self, project: &Project, output_dir: &Path) -> Result<Vec<SourceFile>> {
        let mut sources = Vec::new();
        for source_dir in project.source_dirs() {
            if !source_dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&source_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path().to_path_buf();
                let rel = crate::util::fs::relative_path(&source_dir, &path);
                let is_java = path.extension().is_some_and(|e| e == "java");
                if is_java {
                    if entry.file_name().to_str() == Some("package-info.java") {
                        continue;
                    }
                    let class_file = output_dir.join(rel.with_extension("class"));
                    sources.push(SourceFile { path, class_file });
                } else {
                    copy_if_stale(&path, &output_dir.join(&rel))?;
                }
            }
        }
        Ok(sources)
    }
}

struct SourceFile {
    path: PathBuf,
    /// Expected compiled output for the source, mirrored under bin/
    class_file: PathBuf,
}

/// Record the project's resolved processor list, returning true when it
/// differs from the previous run's record.
fn update_processor_state(state_file: &Path, processors: &[String]) -> Result<bool> {
    let mut out_of_date = false;
    if state_file.exists() {
        let current: Vec<String> = crate::util::fs::read_to_string(state_file)?
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if current != processors {
            out_of_date = true;
        }
    }
    if out_of_date || !state_file.exists() {
        let mut content = processors.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        crate::util::fs::write_string(state_file, &content)?;
    }
    Ok(out_of_date)
}
