//! Command-line parser for `pgp-classic verify`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;

#[derive(Parser, Debug)]
#[clap(
    name = "verify",
    about = "Verify a PGP/MIME signed message",
    long_about = "\
Verify a PGP/MIME signed message

Reads a multipart/signed MIME entity, and has the backend verify the \
signature over the first part.  The backend's diagnostics are shown \
on stderr.

The signature is good if the backend succeeds and one of the lines \
it writes matches the `verify.good-signature` pattern.  If no pattern \
is configured, success suffices.  Otherwise, the program exits with \
a failure status.
",
    after_help = "\
Examples:

  # Verify a signed message.
  pgp-classic verify message.eml
",
)]
pub struct Command {
    #[clap(
        default_value_t = FileOrStdin::default(),
        help = FileOrStdin::HELP,
        value_name = FileOrStdin::VALUE_NAME,
    )]
    pub input: FileOrStdin,
}
