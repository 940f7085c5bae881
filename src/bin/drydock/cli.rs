//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// drydock - a build orchestrator for multi-suite Java/native trees
#[derive(Parser)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory to search for the primary suite (defaults to cwd)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Kill any build subprocess running longer than this many seconds
    #[arg(short = 'T', long, global = true)]
    pub timeout: Option<u64>,

    /// Project names to ignore for this run (repeatable)
    #[arg(long = "ignore-project", global = true)]
    pub ignored_projects: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile projects in dependency order and package distributions
    Build(BuildArgs),

    /// Create archives for projects and distributions
    Archive(ArchiveArgs),

    /// Print the dependency-first build order
    Order(OrderArgs),

    /// Print the dependency graph in Graphviz/DOT form
    Graph(GraphArgs),

    /// Rewrite suite files with canonical dependency lists
    Canonicalize(CanonicalizeArgs),

    /// Remove build outputs
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Force build (disables timestamp checking)
    #[arg(short, long)]
    pub force: bool,

    /// Remove existing build output first
    #[arg(short, long)]
    pub clean: bool,

    /// Comma-separated projects to build (omit to build all projects)
    #[arg(long)]
    pub projects: Option<String>,

    /// Comma-separated projects to build without their dependencies
    #[arg(long)]
    pub only: Option<String>,

    /// Do not build Java projects
    #[arg(long = "no-java")]
    pub no_java: bool,

    /// Do not build native projects
    #[arg(long = "no-native")]
    pub no_native: bool,

    /// Java compliance level for projects without an explicit one
    #[arg(long)]
    pub source: Option<String>,

    /// Path to an alternate batch compiler jar
    #[arg(long)]
    pub batch_jar: Option<PathBuf>,

    /// Do not package distributions after building
    #[arg(long = "no-archive")]
    pub no_archive: bool,
}

#[derive(Args)]
pub struct ArchiveArgs {
    /// Distribution or project names to archive
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args)]
pub struct OrderArgs {
    /// Root projects (omit for all)
    pub projects: Vec<String>,

    /// Include libraries in the order
    #[arg(long)]
    pub libs: bool,

    /// Emit JSON instead of one name per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct GraphArgs {}

#[derive(Args)]
pub struct CanonicalizeArgs {}

#[derive(Args)]
pub struct CleanArgs {
    /// Do not clean Java project outputs
    #[arg(long = "no-java")]
    pub no_java: bool,

    /// Do not clean native projects
    #[arg(long = "no-native")]
    pub no_native: bool,

    /// Do not remove distribution archives
    #[arg(long = "no-dists")]
    pub no_dists: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
