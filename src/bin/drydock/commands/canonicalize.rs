//! `drydock canonicalize` command

use anyhow::Result;

use crate::cli::{CanonicalizeArgs, Cli};
use drydock::ops;

pub fn execute(cli: &Cli, _args: &CanonicalizeArgs) -> Result<()> {
    let (_ctx, reg) = super::load_registry(cli)?;

    let changed = ops::canonicalize(&reg)?;
    if changed > 0 {
        eprintln!("{} file(s) updated", changed);
    }
    // The exit status reflects how many files were rewritten.
    std::process::exit(changed.min(i32::MAX as usize) as i32);
}
