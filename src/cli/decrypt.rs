//! Command-line parser for `pgp-classic decrypt`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;

#[derive(Parser, Debug)]
#[clap(
    name = "decrypt",
    about = "Decrypt a PGP/MIME message",
    long_about = "\
Decrypt a PGP/MIME message

Reads a multipart/encrypted MIME entity, and writes the decrypted \
entity.  The backend's diagnostics are shown on stderr.  If the \
backend vouches for a signature over the plaintext, that is reported.

The passphrase is asked for, unless `--passphrase-file` is given or \
the backend's agent takes care of it.  If the backend rejects it, it \
is forgotten.
",
    after_help = "\
Examples:

  # Decrypt a message.
  pgp-classic decrypt message.eml
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
