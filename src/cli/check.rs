//! Command-line parser for `pgp-classic check`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;

#[derive(Parser, Debug)]
#[clap(
    name = "check",
    about = "Look for inline PGP in a message",
    long_about = "\
Look for inline PGP in a message

Reads a MIME entity, and looks for PGP armor in its text parts.  \
Parts that carry some are labelled: `x-action` is set to \
`pgp-encrypted`, `pgp-signed`, or `pgp-keys`, and `format` to \
`fixed`.  The labelled entity is written out.

Exits with a failure status if no inline PGP is found.
",
    after_help = "\
Examples:

  # Label the inline PGP parts of a message.
  pgp-classic check message.eml
",
)]
pub struct Command {
    #[clap(
        default_value_t = FileOrStdin::default(),
        help = FileOrStdin::HELP,
        value_name = FileOrStdin::VALUE_NAME,
    )]
    pub input: FileOrStdin,

    #[clap(
        long,
        short,
        value_name = FileOrStdout::VALUE_NAME,
        default_value_t = FileOrStdout::default(),
        help = FileOrStdout::HELP,
    )]
    pub output: FileOrStdout,
}
