//! Protects messages like a mail client does on sending.

use anyhow::Result;

use crate::cli::protect;
use crate::pipeline::{self, Security};
use crate::resolve::KeyList;

use super::Context;

const TRACE: bool = false;

pub fn dispatch(ctx: &mut Context, cmd: protect::Command) -> Result<()> {
    tracer!(TRACE, "protect::dispatch");

    let message = super::read_message(&cmd.input)?;

    let mut security = Security {
        encrypt: cmd.encrypt,
        sign: cmd.sign,
        inline: cmd.inline,
    };
    if cmd.menu {
        security = pipeline::send_menu(&mut ctx.pgp, security)?;
    }
    t!("{:?}", security);

    if security.is_empty() {
        qprintln!(quiet=ctx.quiet, "Neither signing nor encrypting.");
    }

    let keylist = if security.encrypt {
        super::recipients(&ctx.pgp, &cmd.recipients)?
    } else {
        KeyList::new()
    };
    let protected = pipeline::protect(&ctx.pgp, &message, security, &keylist)?;

    let mut sink = cmd.output.create(ctx.force)?;
    protected.serialize(&mut sink)?;
    Ok(())
}
