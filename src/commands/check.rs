//! Looks for inline PGP.

use anyhow::Result;

use crate::cli::check;
use crate::pipeline;

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: check::Command) -> Result<()> {
    let mut message = super::read_message(&cmd.input)?;
    let found = pipeline::check_traditional(&mut message);

    let mut sink = cmd.output.create(ctx.force)?;
    message.serialize(&mut sink)?;

    if ! found {
        return Err(anyhow::anyhow!("No inline PGP found"));
    }
    Ok(())
}
