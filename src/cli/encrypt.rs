//! Command-line parser for `pgp-classic encrypt`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;
use super::types::Recipients;

#[derive(Parser, Debug)]
#[clap(
    name = "encrypt",
    about = "Encrypt a message using PGP/MIME",
    long_about = "\
Encrypt a message using PGP/MIME

Reads a MIME entity, and writes a multipart/encrypted entity.

A key is looked up for every recipient.  Keys configured with \
`crypt-hooks` are offered first.  If there is doubt which key to use, \
the user is asked to pick one.  If a recipient can't be resolved, \
nothing is encrypted.
",
    after_help = "\
Examples:

  # Encrypt a message to Alice and Bob.
  pgp-classic encrypt --to alice@example.org --cc bob@example.org message.eml

  # Encrypt and sign.
  pgp-classic encrypt --sign --to alice@example.org message.eml
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

    #[clap(flatten)]
    pub recipients: Recipients,

    #[clap(
        long,
        help = "Also sign the message",
    )]
    pub sign: bool,

    #[clap(
        long,
        value_name = "KEYID",
        help = "Sign using the key KEYID",
        requires = "sign",
    )]
    pub sign_as: Option<String>,
}
