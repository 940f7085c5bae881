//! `drydock build` command

use anyhow::Result;

use crate::cli::{BuildArgs, Cli};
use drydock::builder::{BuildOptions, Orchestrator, Toolchain};

pub fn execute(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let (ctx, reg) = super::load_registry(cli)?;

    let mut toolchain = Toolchain::from_env(ctx.config())?;
    if args.batch_jar.is_some() {
        toolchain = toolchain.with_batch_jar(args.batch_jar.clone());
    }

    let split = |s: &String| -> Vec<String> { s.split(',').map(|p| p.trim().to_string()).collect() };
    let opts = BuildOptions {
        force: args.force,
        clean: args.clean,
        java: !args.no_java,
        native: !args.no_native,
        projects: args.projects.as_ref().map(split),
        only: args.only.as_ref().map(split),
        default_compliance: args.source.as_deref().map(str::parse).transpose()?,
        archive: !args.no_archive,
        progress: !cli.verbose,
    };

    let timeout = super::timeout(cli, &ctx);
    let report = Orchestrator::new(&reg, toolchain, opts)
        .with_timeout(timeout)
        .build()?;

    eprintln!(
        "    Finished {} project(s) built, {} skipped, {} distribution(s) packaged",
        report.built.len(),
        report.skipped.len(),
        report.archived.len()
    );
    Ok(())
}
