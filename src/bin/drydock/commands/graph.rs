//! `drydock graph` command

use anyhow::Result;

use crate::cli::{Cli, GraphArgs};
use drydock::graph;

pub fn execute(cli: &Cli, _args: &GraphArgs) -> Result<()> {
    let (_ctx, reg) = super::load_registry(cli)?;

    for suite in reg.suites() {
        if let Some(rev) = suite.revision() {
            println!("// suite {} at {}", suite.name(), rev);
        }
    }
    print!("{}", graph::to_dot(&reg));
    Ok(())
}
