//! `drydock archive` command

use anyhow::{bail, Result};

use crate::cli::{ArchiveArgs, Cli};
use drydock::packager::{make_project_archive, ArchivePackager};

pub fn execute(cli: &Cli, args: &ArchiveArgs) -> Result<()> {
    let (_ctx, reg) = super::load_registry(cli)?;
    let packager = ArchivePackager::new(&reg);

    for name in &args.names {
        if let Some(dist) = reg.distribution(name) {
            packager.make_archive(dist)?;
            println!("{}", dist.path().display());
        } else if let Some(project) = reg.project(name) {
            let path = make_project_archive(project, None)?;
            println!("{}", path.display());
        } else {
            bail!("no distribution or project named {}", name);
        }
    }
    Ok(())
}
