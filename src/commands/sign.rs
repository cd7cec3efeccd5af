//! Signs messages.

use std::io::Write;

use anyhow::Result;

use crate::cli::sign;
use crate::mime::Part;
use crate::pipeline;

use super::Context;

pub fn dispatch(ctx: &mut Context, cmd: sign::Command) -> Result<()> {
    if let Some(keyid) = cmd.sign_as {
        ctx.pgp.config_mut().sign_as = Some(keyid);
    }

    let data = cmd.input.read_all()?;
    let signed = if cmd.detached {
        pipeline::sign_detached(&ctx.pgp, &data)?
    } else {
        let part = Part::parse(&data)?;
        pipeline::sign_message(&ctx.pgp, &part)?.to_vec()?
    };

    let mut sink = cmd.output.create(ctx.force)?;
    sink.write_all(&signed)?;
    Ok(())
}
