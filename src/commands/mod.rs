//! Implements the commands.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::address::Address;
use crate::charset::BuiltinCharsets;
use crate::cli::{Cli, Subcommands};
use crate::cli::types::{FileOrStdin, Recipients};
use crate::config::{Config, ConfigFile};
use crate::keys::BackendKeySource;
use crate::mime::Part;
use crate::pgp::Pgp;
use crate::process::ProcessInvoker;
use crate::resolve::{self, KeyList};
use crate::ui::{BatchUi, Interaction, TerminalUi};

pub mod check;
pub mod config;
pub mod decrypt;
pub mod encrypt;
pub mod inline;
pub mod keys;
pub mod protect;
pub mod show;
pub mod sign;
pub mod verify;

const TRACE: bool = false;

/// What the commands work with.
pub struct Context<'a> {
    pub pgp: Pgp<'a>,
    pub quiet: bool,
    pub force: bool,
}

impl Context<'_> {
    /// Returns where the backend's diagnostics go.
    ///
    /// In quiet mode, they are dropped.
    pub fn diagnostics(&self) -> Box<dyn Write> {
        if self.quiet {
            Box::new(io::sink())
        } else {
            Box::new(io::stderr())
        }
    }
}

/// Returns the location of the configuration file.
fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(ConfigFile::default_path)
}

/// Reads and parses a MIME entity.
fn read_message(input: &FileOrStdin) -> Result<Part> {
    Part::parse(&input.read_all()?)
        .with_context(|| format!("Parsing the message in {} failed", input))
}

/// Resolves the recipients to a key list.
fn recipients(pgp: &Pgp, recipients: &Recipients) -> Result<KeyList>
{
    if recipients.is_empty() {
        return Err(anyhow::anyhow!("No recipients given, use --to, --cc, or --bcc"));
    }

    let parse = |list: &[String]| -> Vec<Address> {
        list.iter().flat_map(|s| Address::parse_list(s)).collect()
    };
    resolve::find_keys(pgp, &parse(&recipients.to), &parse(&recipients.cc),
                       &parse(&recipients.bcc))
}

pub fn dispatch(cli: Cli) -> Result<()> {
    tracer!(TRACE, "dispatch");

    let path = config_path(&cli);
    t!("Configuration file: {:?}", path);

    let cmd = match cli.subcommand {
        Subcommands::Config(cmd) =>
            return config::dispatch(path.as_deref(), cli.quiet, cli.force, cmd),
        cmd => cmd,
    };

    let config = match &path {
        Some(path) => ConfigFile::read(path)?.config()
            .with_context(|| format!("Invalid configuration in {}",
                                     path.display()))?,
        None => Config::default(),
    };

    let invoker = ProcessInvoker::new(config.templates.clone(),
                                      config.keyring.clone(), cli.verbose)?;
    let keys = BackendKeySource::new(
        ProcessInvoker::new(config.templates.clone(),
                            config.keyring.clone(), cli.verbose)?);
    let ui: Box<dyn Interaction> = if cli.batch {
        Box::new(BatchUi::new(cli.quiet))
    } else {
        Box::new(TerminalUi::new())
    };

    let pgp = Pgp::new(config, invoker, &keys, &*ui, &BuiltinCharsets);
    if let Some(file) = &cli.passphrase_file {
        let mut secret = std::fs::read(file)
            .with_context(|| format!("Reading {}", file.display()))?;
        if secret.last() == Some(&b'\n') {
            secret.pop();
        }
        pgp.seed_passphrase(secret.into());
    }

    let mut ctx = Context {
        pgp,
        quiet: cli.quiet,
        force: cli.force,
    };

    match cmd {
        Subcommands::Decrypt(cmd) => decrypt::dispatch(&mut ctx, cmd),
        Subcommands::Verify(cmd) => verify::dispatch(&mut ctx, cmd),
        Subcommands::Sign(cmd) => sign::dispatch(&mut ctx, cmd),
        Subcommands::Encrypt(cmd) => encrypt::dispatch(&mut ctx, cmd),
        Subcommands::Inline(cmd) => inline::dispatch(&mut ctx, cmd),
        Subcommands::Protect(cmd) => protect::dispatch(&mut ctx, cmd),
        Subcommands::Show(cmd) => show::dispatch(&mut ctx, cmd),
        Subcommands::Check(cmd) => check::dispatch(&mut ctx, cmd),
        Subcommands::Keys(cmd) => keys::dispatch(&mut ctx, cmd),
        Subcommands::Config(_) => unreachable!("handled above"),
    }
}
