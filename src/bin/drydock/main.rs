//! drydock CLI - a build orchestrator for multi-suite Java/native trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::new("drydock=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match &cli.command {
        Commands::Build(args) => commands::build::execute(&cli, args),
        Commands::Archive(args) => commands::archive::execute(&cli, args),
        Commands::Order(args) => commands::order::execute(&cli, args),
        Commands::Graph(args) => commands::graph::execute(&cli, args),
        Commands::Canonicalize(args) => commands::canonicalize::execute(&cli, args),
        Commands::Clean(args) => commands::clean::execute(&cli, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
