//! Command-line parser for `pgp-classic config`.

use clap::{Parser, Subcommand};

use super::types::ClapData;
use super::types::FileOrStdout;

#[derive(Debug, Parser)]
#[clap(
    name = "config",
    about = "Get configuration options",
    long_about = "\
Get configuration options

The configuration is a TOML file.  Use `pgp-classic config template` \
to get a commented template with the default values.
",
    subcommand_required = true,
    arg_required_else_help = true,
)]
pub struct Command {
    #[clap(subcommand)]
    pub subcommand: Subcommands,
}

#[derive(Debug, Subcommand)]
pub enum Subcommands {
    Template(TemplateCommand),
    Verify(VerifyCommand),
}

#[derive(Debug, Parser)]
#[clap(
    name = "template",
    about = "Write a template configuration file",
    long_about = "\
Write a template configuration file

Writes a template containing the default values to the given file or \
stdout.  This can be used as a starting point to tweak the \
configuration.",
    after_help = "\
Examples:

  # Write a template configuration.
  pgp-classic config template
",
)]
pub struct TemplateCommand {
    #[clap(
        long,
        short,
        value_name = FileOrStdout::VALUE_NAME,
        default_value_t = FileOrStdout::default(),
        help = FileOrStdout::HELP,
    )]
    pub output: FileOrStdout,
}

#[derive(Debug, Parser)]
#[clap(
    name = "verify",
    about = "Check the configuration file",
    long_about = "\
Check the configuration file

Unknown keys and bad values are reported.",
    after_help = "\
Examples:

  # Check the configuration.
  pgp-classic config verify
",
)]
pub struct VerifyCommand {
}
