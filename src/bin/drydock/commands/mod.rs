//! Subcommand implementations.

pub mod archive;
pub mod build;
pub mod canonicalize;
pub mod clean;
pub mod completions;
pub mod graph;
pub mod order;

use anyhow::Result;
use drydock::{GlobalContext, Registry};

use crate::cli::Cli;

/// Load the registry rooted at the primary suite for this invocation.
pub fn load_registry(cli: &Cli) -> Result<(GlobalContext, Registry)> {
    let ctx = match cli.directory {
        Some(ref dir) => GlobalContext::with_cwd(dir.clone())?,
        None => GlobalContext::new()?,
    };

    let suite_conf = ctx.find_suite()?;
    let suite_dir = suite_conf.parent().expect("suite.conf has a parent");

    let mut reg = Registry::new();
    reg.set_ignored(cli.ignored_projects.iter().cloned());
    reg.load_suite(suite_dir)?;
    Ok((ctx, reg))
}

/// The subprocess timeout for this invocation: the CLI flag wins over
/// the tool configuration.
pub fn timeout(cli: &Cli, ctx: &GlobalContext) -> Option<std::time::Duration> {
    cli.timeout
        .map(std::time::Duration::from_secs)
        .or_else(|| ctx.subprocess_timeout())
}
