//! Command-line parser for `pgp-classic sign`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;

#[derive(Parser, Debug)]
#[clap(
    name = "sign",
    about = "Sign a message",
    long_about = "\
Sign a message

Reads a MIME entity, and writes a multipart/signed entity carrying \
it and a detached signature.  With `--detached`, the input is signed \
as is, and only the armored signature is written.

The key configured with `keys.sign-as` is used, unless `--sign-as` is \
given.  Otherwise, the backend picks one.
",
    after_help = "\
Examples:

  # Sign a message.
  pgp-classic sign message.eml

  # Create a detached signature using a specific key.
  pgp-classic sign --detached --sign-as 0x12345678 document.txt
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
        help = "Write only an armored detached signature over the input",
    )]
    pub detached: bool,

    #[clap(
        long,
        value_name = "KEYID",
        help = "Sign using the key KEYID",
    )]
    pub sign_as: Option<String>,
}
