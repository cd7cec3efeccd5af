//! Command-line parser for `pgp-classic inline`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;
use super::types::Recipients;

#[derive(Parser, Debug)]
#[clap(
    name = "inline",
    about = "Protect a text using inline PGP",
    long_about = "\
Protect a text using inline PGP

Reads a text/plain MIME entity, and writes it clearsigned or \
encrypted, with the PGP armor in the body.  Without `--encrypt`, the \
text is clearsigned.

Bodies in a charset other than US-ASCII are converted to UTF-8 \
first.
",
    after_help = "\
Examples:

  # Clearsign a text.
  pgp-classic inline note.eml

  # Encrypt and sign a text.
  pgp-classic inline --encrypt --sign --to alice@example.org note.eml
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
        help = "Encrypt the text",
    )]
    pub encrypt: bool,

    #[clap(
        long,
        help = "Sign the text",
    )]
    pub sign: bool,

    #[clap(flatten)]
    pub recipients: Recipients,
}
