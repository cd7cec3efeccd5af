//! Command-line parser for `pgp-classic keys`.

use clap::{Parser, Subcommand};

use super::types::ClapData;
use super::types::FileOrStdin;
use super::types::FileOrStdout;
use super::types::Recipients;

#[derive(Parser, Debug)]
#[clap(
    name = "keys",
    about = "Find, list, import, and export keys",
    long_about = "\
Find, list, import, and export keys

Keys are listed by the backend using the `list-pubring` and \
`list-secring` commands.
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
    Find(FindCommand),
    Search(SearchCommand),
    List(ListCommand),
    Import(ImportCommand),
    Export(ExportCommand),
    Extract(ExtractCommand),
}

#[derive(Parser, Debug)]
#[clap(
    name = "find",
    about = "Resolve recipients to key IDs",
    long_about = "\
Resolve recipients to key IDs

Looks up a key for every recipient, like `encrypt` does, and prints \
the resulting key list.
",
    after_help = "\
Examples:

  # Find the keys for Alice and Bob.
  pgp-classic keys find --to alice@example.org --bcc bob@example.org
",
)]
pub struct FindCommand {
    #[clap(flatten)]
    pub recipients: Recipients,
}

#[derive(Parser, Debug)]
#[clap(
    name = "search",
    about = "Pick a key matching a string",
    long_about = "\
Pick a key matching a string

A key matches if the string is its key ID, short or long, with or \
without `0x`, or is contained in one of its user IDs.  If there is \
doubt, the user is asked to pick one.  Prints the key ID.
",
    after_help = "\
Examples:

  # Pick one of Alice's keys.
  pgp-classic keys search alice
",
)]
pub struct SearchCommand {
    #[clap(
        value_name = "STRING",
        help = "Look for keys matching STRING",
    )]
    pub query: String,

    #[clap(
        long,
        help = "Look in the secret keyring",
    )]
    pub secret: bool,

    #[clap(
        long,
        help = "Only consider keys that can sign",
    )]
    pub can_sign: bool,

    #[clap(
        long,
        help = "Only consider keys that can encrypt",
    )]
    pub can_encrypt: bool,
}

#[derive(Parser, Debug)]
#[clap(
    name = "list",
    about = "List keys",
    long_about = "\
List keys

Lists the keys matching any of the patterns, or all keys.  Entries \
are formatted using `keys.entry-format`, and sorted according to \
`keys.sort`.
",
    after_help = "\
Examples:

  # List all public keys.
  pgp-classic keys list

  # List the secret keys for Alice.
  pgp-classic keys list --secret alice@example.org
",
)]
pub struct ListCommand {
    #[clap(
        value_name = "PATTERN",
        help = "List keys matching PATTERN",
    )]
    pub patterns: Vec<String>,

    #[clap(
        long,
        help = "List the secret keyring",
    )]
    pub secret: bool,
}

#[derive(Parser, Debug)]
#[clap(
    name = "import",
    about = "Import keys",
    long_about = "\
Import keys

Hands the keys to the backend's `import` command.
",
    after_help = "\
Examples:

  # Import Alice's key.
  pgp-classic keys import alice.asc
",
)]
pub struct ImportCommand {
    #[clap(
        default_value_t = FileOrStdin::default(),
        help = FileOrStdin::HELP,
        value_name = FileOrStdin::VALUE_NAME,
    )]
    pub input: FileOrStdin,
}

#[derive(Parser, Debug)]
#[clap(
    name = "export",
    about = "Export a key",
    long_about = "\
Export a key

Exports the principal key of the selected key.  If no key ID is \
given, the user is asked for one.  With `--attachment`, an \
application/pgp-keys MIME entity is written.
",
    after_help = "\
Examples:

  # Export Alice's key as an attachment.
  pgp-classic keys export --attachment 0x12345678
",
)]
pub struct ExportCommand {
    #[clap(
        value_name = "KEYID",
        help = "Export the key KEYID",
    )]
    pub keyid: Option<String>,

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
        help = "Write a MIME entity",
    )]
    pub attachment: bool,
}

#[derive(Parser, Debug)]
#[clap(
    name = "extract",
    about = "Import the keys in a message body",
    long_about = "\
Import the keys in a message body

Inline PGP blocks are decoded first, so that keys in encrypted or \
signed texts are found too.  Then, everything is handed to the \
backend's `import` command.
",
    after_help = "\
Examples:

  # Import the keys in a message body.
  pgp-classic keys extract body.txt
",
)]
pub struct ExtractCommand {
    #[clap(
        default_value_t = FileOrStdin::default(),
        help = FileOrStdin::HELP,
        value_name = FileOrStdin::VALUE_NAME,
    )]
    pub input: FileOrStdin,
}
