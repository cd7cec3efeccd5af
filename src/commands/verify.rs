//! Verifies PGP/MIME signed messages.

use anyhow::Result;

use crate::cli::verify;
use crate::pipeline::{self, SignatureStatus};

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: verify::Command) -> Result<()> {
    let message = super::read_message(&cmd.input)?;

    let mut diagnostics = ctx.diagnostics();
    match pipeline::verify_signed(&ctx.pgp, &message, &mut diagnostics)? {
        SignatureStatus::Good => {
            qprintln!(quiet=ctx.quiet, "Good signature.");
            Ok(())
        }
        SignatureStatus::GoodUnconfirmed => {
            qprintln!(quiet=ctx.quiet,
                      "The backend accepted the signature.  No pattern is \
                       configured to confirm that it is good.");
            Ok(())
        }
        SignatureStatus::Bad => Err(anyhow::anyhow!("Bad signature")),
    }
}
