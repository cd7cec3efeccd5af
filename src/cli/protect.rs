//! Command-line parser for `pgp-classic protect`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;
use super::types::Recipients;

#[derive(Parser, Debug)]
#[clap(
    name = "protect",
    about = "Sign and encrypt a message as a mail client would on sending",
    long_about = "\
Sign and encrypt a message as a mail client would on sending

Reads a MIME entity, and writes it signed, encrypted, or both.  With \
`--menu`, the user picks what to do, starting from the given flags.

PGP/MIME is used, unless `--inline` is given.  Inline PGP can't be \
used for anything but a single text/plain part.  If \
`keys.auto-inline` is set, such messages are protected using \
PGP/MIME instead.
",
    after_help = "\
Examples:

  # Sign and encrypt a message.
  pgp-classic protect --sign --encrypt --to alice@example.org message.eml

  # Ask what to do.
  pgp-classic protect --menu --to alice@example.org message.eml
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

    #[clap(
        long,
        help = "Encrypt the message",
    )]
    pub encrypt: bool,

    #[clap(
        long,
        help = "Sign the message",
    )]
    pub sign: bool,

    #[clap(
        long,
        help = "Use inline PGP instead of PGP/MIME",
    )]
    pub inline: bool,

    #[clap(
        long,
        help = "Ask what to do",
    )]
    pub menu: bool,

    #[clap(flatten)]
    pub recipients: Recipients,
}
