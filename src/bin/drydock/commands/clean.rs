//! `drydock clean` command

use anyhow::Result;

use crate::cli::{Cli, CleanArgs};
use drydock::ops::{self, CleanOptions};

pub fn execute(cli: &Cli, args: &CleanArgs) -> Result<()> {
    let (ctx, reg) = super::load_registry(cli)?;

    let opts = CleanOptions {
        java: !args.no_java,
        native: !args.no_native,
        distributions: !args.no_dists,
    };
    ops::clean(&reg, &opts, super::timeout(cli, &ctx))
}
