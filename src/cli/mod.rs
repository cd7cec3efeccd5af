//! Defines the command-line interface.
//!
//! # Interface guidelines
//!
//! - Use the imperative mood in the first sentence documenting
//!   commands, subcommands, and arguments.
//!
//! - Messages are read and written as MIME entities, i.e. headers
//!   describing the body, an empty line, and the body.
//!
//! - Data goes to stdout or the file given with `--output`.  Banners,
//!   the backend's diagnostics, and status messages go to stderr.

use std::path::PathBuf;

use clap::{Command, CommandFactory, Parser, Subcommand};

pub mod check;
pub mod config;
pub mod decrypt;
pub mod encrypt;
pub mod inline;
pub mod keys;
pub mod protect;
pub mod show;
pub mod sign;
pub mod types;
pub mod verify;

pub const GLOBAL_OPTIONS_HEADER: &str = "Global Options";

/// Builds the top-level Clap command.
pub fn build() -> Command {
    let version = format!(
        "{} (sequoia-openpgp {})",
        env!("CARGO_PKG_VERSION"),
        sequoia_openpgp::VERSION);

    Cli::command()
        .version(version)
    // To improve readability limit the width of the text columns.
        .max_term_width(100)
}

/// Signs, encrypts, decrypts, and verifies mail using an OpenPGP
/// backend.
#[derive(Parser, Debug)]
#[clap(
    name = "pgp-classic",
    about = "Sign, encrypt, decrypt, and verify mail using an OpenPGP backend",
    long_about = "\
Sign, encrypt, decrypt, and verify mail using an OpenPGP backend

The cryptography is done by an external program, by default `gpg`, \
which is run on temporary files.  The commands run for each operation \
are configurable, see `pgp-classic config template`.

Both PGP/MIME (RFC 3156) and inline PGP messages are supported.
",
    subcommand_required = true,
    arg_required_else_help = true,
    disable_colored_help = true,
)]
pub struct Cli {
    #[clap(
        long,
        value_name = "FILE",
        env = "PGP_CLASSIC_CONFIG",
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Read the configuration from FILE",
        long_help = "\
Read the configuration from FILE.

By default, the configuration is read from \
`$XDG_CONFIG_HOME/pgp-classic/config.toml`.  If the file doesn't \
exist, the defaults are used.",
    )]
    pub config: Option<PathBuf>,

    #[clap(
        long,
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Never prompt for anything",
        long_help = "\
Never prompt for anything.

Questions get their default answers.  Passphrase prompts and key \
selections are cancelled, so operations needing them fail unless \
`--passphrase-file` is given or there is no doubt which key to use.",
    )]
    pub batch: bool,

    #[clap(
        long,
        value_name = "FILE",
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Seed the passphrase cache with the content of FILE",
        long_help = "\
Seed the passphrase cache with the content of FILE.

A single trailing newline is stripped.  The passphrase expires like \
one entered at the prompt.",
    )]
    pub passphrase_file: Option<PathBuf>,

    #[clap(
        short = 'v',
        long,
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Be more verbose",
        long_help = "Be more verbose.  Print every backend command run.",
    )]
    pub verbose: bool,

    #[clap(
        short = 'q',
        long = "quiet",
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Be more quiet",
        conflicts_with = "verbose",
    )]
    pub quiet: bool,

    #[clap(
        short = 'f',
        long = "force",
        global = true,
        help_heading = GLOBAL_OPTIONS_HEADER,
        help = "Overwrite existing files",
    )]
    pub force: bool,

    #[clap(subcommand)]
    pub subcommand: Subcommands,
}

/// The order of these subcommands determines the order in which they
/// are displayed in the help output.
#[derive(Debug, Subcommand)]
pub enum Subcommands {
    Decrypt(decrypt::Command),
    Verify(verify::Command),
    Sign(sign::Command),
    Encrypt(encrypt::Command),
    Inline(inline::Command),
    Protect(protect::Command),
    Show(show::Command),
    Check(check::Command),
    Keys(keys::Command),
    Config(config::Command),
}

#[cfg(test)]
mod test {
    use super::*;

    use clap::FromArgMatches;

    #[test]
    fn debug_assert() {
        build().debug_assert();
    }

    #[test]
    fn globals_anywhere() {
        let matches = build().try_get_matches_from([
            "pgp-classic", "keys", "list", "--batch", "--config", "c.toml",
        ]).unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        assert!(cli.batch);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.subcommand, Subcommands::Keys(_)));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(build().try_get_matches_from([
            "pgp-classic", "-v", "-q", "config", "verify",
        ]).is_err());
    }
}
