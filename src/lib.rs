//! Drives an external OpenPGP backend on behalf of a mail client.
//!
//! Messages are signed, encrypted, decrypted, and verified by running
//! configurable backend commands, e.g. `gpg`, on temporary files.
//! Besides PGP/MIME (RFC 3156), inline ("traditional") PGP is
//! supported.  Keys are listed by the backend, and picked
//! interactively where there is doubt.
//!
//! The entry point is [`pgp::Pgp`], which ties together the
//! configuration, the passphrase cache, and the collaborators the
//! mail client supplies.  The operations live in [`pipeline`].

#[macro_use] mod macros;
#[macro_use] mod log;

pub mod address;
pub mod armor;
pub mod charset;
pub mod config;
pub mod entry;
pub mod error;
pub use error::Error;
pub mod keys;
pub mod mime;
pub mod output;
pub mod passphrase;
pub mod pgp;
pub mod pipeline;
pub mod process;
pub mod resolve;
pub mod select;
pub mod template;
pub mod ui;

pub mod cli;
pub mod commands;

/// Prints the error and causes, if any.
pub fn print_error_chain(err: &anyhow::Error) {
    weprintln!(initial_indent="Error: ", "{}", err);
    err.chain().skip(1).for_each(|cause| weprintln!("  because: {}", cause));
}
