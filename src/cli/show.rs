//! Command-line parser for `pgp-classic show`.

use clap::Parser;

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;

#[derive(Parser, Debug)]
#[clap(
    name = "show",
    about = "Display a message",
    long_about = "\
Display a message

Reads a MIME entity, and writes it as a mail client displays it: \
encrypted parts are decrypted, signatures are verified, and inline \
PGP blocks are replaced by what they contain.  The backend's \
diagnostics are shown between banners.
",
    after_help = "\
Examples:

  # Display a message.
  pgp-classic show message.eml
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
        help = "Don't verify clearsigned texts",
    )]
    pub no_verify: bool,

    #[clap(
        long,
        value_name = "PREFIX",
        help = "Prefix every line of inline PGP output with PREFIX",
    )]
    pub prefix: Option<String>,
}
