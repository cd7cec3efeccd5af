//! Configuration template and validation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::config;
use crate::config::ConfigFile;

pub fn dispatch(path: Option<&Path>, quiet: bool, force: bool,
                cmd: config::Command)
                -> Result<()>
{
    match cmd.subcommand {
        config::Subcommands::Template(c) => template(path, force, c),
        config::Subcommands::Verify(_) => verify(path, quiet),
    }
}

/// Implements `pgp-classic config template`.
fn template(path: Option<&Path>, force: bool, cmd: config::TemplateCommand)
            -> Result<()>
{
    let mut sink = cmd.output.create(force)?;
    ConfigFile::default_template(path)?
        .dump(&mut sink)?;

    Ok(())
}

/// Implements `pgp-classic config verify`.
fn verify(path: Option<&Path>, quiet: bool) -> Result<()> {
    let path = path.ok_or_else(|| anyhow::anyhow!(
        "No configuration file, use --config to name one"))?;

    ConfigFile::read(path)?
        .verify()
        .with_context(|| format!("Invalid configuration in {}",
                                 path.display()))?;

    qprintln!(quiet=quiet, "The configuration in {} is valid.", path.display());
    Ok(())
}
