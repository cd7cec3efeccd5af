//! Decrypts PGP/MIME messages.

use std::io::Write;

use anyhow::Result;

use crate::cli::decrypt;
use crate::pipeline;

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: decrypt::Command) -> Result<()> {
    let message = super::read_message(&cmd.input)?;

    let mut diagnostics = ctx.diagnostics();
    let decrypted = pipeline::decrypt_mime(&ctx.pgp, &message, &mut diagnostics)?;

    let mut sink = cmd.output.create(ctx.force)?;
    sink.write_all(&decrypted.raw)?;

    if decrypted.good_signature {
        qprintln!(quiet=ctx.quiet, "Good signature.");
    }
    Ok(())
}
