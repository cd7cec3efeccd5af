//! Protects texts using inline PGP.

use anyhow::Result;

use crate::cli::inline;
use crate::pipeline::{self, Security};
use crate::resolve::KeyList;

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: inline::Command) -> Result<()> {
    let message = super::read_message(&cmd.input)?;

    let security = Security {
        encrypt: cmd.encrypt,
        sign: cmd.sign,
        inline: true,
    };
    let keylist = if security.encrypt {
        super::recipients(&ctx.pgp, &cmd.recipients)?
    } else {
        KeyList::new()
    };
    let protected = pipeline::traditional(&ctx.pgp, &message, security,
                                          &keylist)?;

    let mut sink = cmd.output.create(ctx.force)?;
    protected.serialize(&mut sink)?;
    Ok(())
}
