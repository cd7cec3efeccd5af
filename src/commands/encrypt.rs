//! Encrypts messages using PGP/MIME.

use anyhow::Result;

use crate::cli::encrypt;
use crate::pipeline;

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: encrypt::Command) -> Result<()> {
    if let Some(keyid) = cmd.sign_as {
        ctx.pgp.config_mut().sign_as = Some(keyid);
    }

    let message = super::read_message(&cmd.input)?;
    let keylist = super::recipients(&ctx.pgp, &cmd.recipients)?;
    let encrypted = pipeline::encrypt_message(&ctx.pgp, &message, &keylist,
                                              cmd.sign)?;

    let mut sink = cmd.output.create(ctx.force)?;
    encrypted.serialize(&mut sink)?;
    Ok(())
}
