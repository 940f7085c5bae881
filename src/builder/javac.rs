//! Java toolchain discovery and compiler-command assembly.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::JavaCompliance;
use crate::util::config::Config;
use crate::util::process::ProcessBuilder;

/// The configured Java toolchain: a JDK home plus its compliance level
/// and an optional alternate batch compiler jar.
#[derive(Debug, Clone)]
pub struct Toolchain {
    java_home: PathBuf,
    compliance: JavaCompliance,
    batch_jar: Option<PathBuf>,
}

impl Toolchain {
    /// Construct a toolchain rooted at `java_home`.
    pub fn new(java_home: impl Into<PathBuf>, compliance: JavaCompliance) -> Self {
        Toolchain {
            java_home: java_home.into(),
            compliance,
            batch_jar: None,
        }
    }

    /// Use an alternate batch compiler jar instead of javac.
    pub fn with_batch_jar(mut self, jar: Option<PathBuf>) -> Self {
        self.batch_jar = jar;
        self
    }

    /// Discover the toolchain from `JAVA_HOME` and the tool config.
    ///
    /// A missing `JAVA_HOME` is fatal: nothing can be compiled without
    /// it. The compliance level comes from the config when set, otherwise
    /// from `javac -version`.
    pub fn from_env(config: &Config) -> Result<Self> {
        let java_home = std::env::var_os("JAVA_HOME")
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .context(
                "JAVA_HOME is not set; point it at the JDK to build with",
            )?;
        if !java_home.is_dir() {
            bail!("JAVA_HOME does not denote a directory: {}", java_home.display());
        }

        let compliance = match config.build.compliance.as_deref() {
            Some(c) => c.parse()?,
            None => detect_compliance(&javac_path(&java_home))?,
        };

        let batch_jar = config.build.batch_jar.clone().filter(|p| {
            if p.exists() {
                true
            } else {
                tracing::warn!("batch compiler jar not found, falling back to javac: {}", p.display());
                false
            }
        });

        Ok(Toolchain {
            java_home,
            compliance,
            batch_jar,
        })
    }

    /// The JDK home directory.
    pub fn java_home(&self) -> &Path {
        &self.java_home
    }

    /// The toolchain's compliance level.
    pub fn compliance(&self) -> JavaCompliance {
        self.compliance
    }

    /// The javac executable.
    pub fn javac(&self) -> PathBuf {
        javac_path(&self.java_home)
    }

    /// The java launcher.
    pub fn java(&self) -> PathBuf {
        self.java_home.join("bin").join(exe("java"))
    }

    /// The batch compiler jar, when configured.
    pub fn batch_jar(&self) -> Option<&Path> {
        self.batch_jar.as_deref()
    }

    /// Whether this toolchain can compile sources requiring `required`.
    /// Projects with no declared compliance always pass.
    pub fn supports(&self, required: Option<JavaCompliance>) -> bool {
        match required {
            Some(required) => self.compliance.satisfies(required),
            None => true,
        }
    }

    /// Assemble the compile invocation for one project.
    pub fn compile_command(&self, spec: &CompileSpec<'_>) -> ProcessBuilder {
        let compliance = spec.compliance.to_string();
        match self.batch_jar {
            None => {
                let mut pb = ProcessBuilder::new(self.javac())
                    .arg("-g")
                    .args(["-source", compliance.as_str()])
                    .args(["-target", compliance.as_str()])
                    .args(["-classpath", spec.classpath])
                    .arg("-d")
                    .arg(spec.output_dir);
                pb = append_processor_args(pb, spec);
                pb.arg(format!("@{}", spec.argfile.display()))
            }
            Some(ref jar) => {
                // Batch compiler spells the compliance as a single flag.
                let mut pb = ProcessBuilder::new(self.java())
                    .arg("-jar")
                    .arg(jar)
                    .arg(format!("-{}", compliance))
                    .args(["-cp", spec.classpath])
                    .arg("-g")
                    .arg("-d")
                    .arg(spec.output_dir);
                pb = append_processor_args(pb, spec);
                pb.arg(format!("@{}", spec.argfile.display()))
            }
        }
    }
}

fn append_processor_args(pb: ProcessBuilder, spec: &CompileSpec<'_>) -> ProcessBuilder {
    match (&spec.processor_path, &spec.gen_dir) {
        (Some(path), Some(gen)) => pb
            .args(["-processorpath", path.as_str()])
            .arg("-s")
            .arg(gen),
        _ => pb.arg("-proc:none"),
    }
}

/// Inputs for one compiler invocation.
#[derive(Debug)]
pub struct CompileSpec<'a> {
    /// Transitive classpath, already joined
    pub classpath: &'a str,

    /// Class-file output directory
    pub output_dir: &'a Path,

    /// Argument file listing every source path
    pub argfile: &'a Path,

    /// Effective compliance for -source/-target
    pub compliance: JavaCompliance,

    /// Processor classpath; None disables annotation processing
    pub processor_path: Option<String>,

    /// Generated-source output directory, paired with `processor_path`
    pub gen_dir: Option<PathBuf>,
}

fn javac_path(java_home: &Path) -> PathBuf {
    java_home.join("bin").join(exe("javac"))
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Parse `javac -version` output ("javac 1.8.0_292", "javac 17.0.1")
/// into a compliance level.
pub fn parse_javac_version(output: &str) -> Result<JavaCompliance> {
    let token = output
        .split_whitespace()
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .with_context(|| format!("unrecognized javac version output: {:?}", output))?;

    let mut parts = token.split(['.', '_', '-']);
    let first: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .with_context(|| format!("unrecognized javac version output: {:?}", output))?;
    if first == 1 {
        let minor: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .with_context(|| format!("unrecognized javac version output: {:?}", output))?;
        Ok(JavaCompliance::new(minor))
    } else {
        Ok(JavaCompliance::new(first))
    }
}

fn detect_compliance(javac: &Path) -> Result<JavaCompliance> {
    let output = ProcessBuilder::new(javac)
        .arg("-version")
        .exec()
        .with_context(|| format!("failed to run {} -version", javac.display()))?;
    // Old JDKs print the version on stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_javac_version(&text)
}
