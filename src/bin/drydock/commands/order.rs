//! `drydock order` command

use anyhow::Result;

use crate::cli::{Cli, OrderArgs};
use drydock::graph;

pub fn execute(cli: &Cli, args: &OrderArgs) -> Result<()> {
    let (_ctx, reg) = super::load_registry(cli)?;

    let roots = if args.projects.is_empty() {
        None
    } else {
        Some(args.projects.as_slice())
    };
    let order = graph::sorted_build_order(&reg, roots, args.libs, true)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else {
        for name in order {
            println!("{}", name);
        }
    }
    Ok(())
}
