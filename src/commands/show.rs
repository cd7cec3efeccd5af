//! Displays messages.

use std::io::Write;

use anyhow::Result;

use crate::armor::ArmorKind;
use crate::cli::show;
use crate::error::Error;
use crate::mime::Part;
use crate::pgp::Pgp;
use crate::pipeline::{self, BodyHandler, HandlerState};

use super::Context;

const TRACE: bool = false;

/// Renders a message the way a mail client's pager would.
struct Viewer<'a> {
    verify: bool,
    prefix: Option<&'a str>,
    /// The verdict on every signature seen.
    signatures: Vec<bool>,
}

impl Viewer<'_> {
    /// Displays a multipart/signed part, and verifies it.
    fn signed(&mut self, pgp: &Pgp, part: &Part, out: &mut dyn Write)
              -> Result<()>
    {
        write!(out, "[-- The following data is signed --]\n\n")?;
        self.handle(pgp, &part.parts[0], out)?;
        writeln!(out)?;
        if self.verify {
            let status = pipeline::verify_signed(pgp, part, out)?;
            self.signatures.push(status.is_good());
        }
        writeln!(out, "[-- End of signed data --]")?;
        Ok(())
    }

    /// Displays a text carrying inline PGP.
    fn inline(&mut self, pgp: &Pgp, part: &Part, out: &mut dyn Write)
              -> Result<()>
    {
        let state = HandlerState {
            display: true,
            verify: self.verify,
            prefix: self.prefix,
            charset: Some(part.charset()),
            handle_keys: true,
        };
        match pipeline::application_pgp_handler(pgp, &part.body, &state, out) {
            Ok(outcome) => {
                if self.verify && outcome.regions.iter()
                    .any(|r| r.kind == ArmorKind::ClearSignedMessage)
                {
                    self.signatures.push(outcome.good_signature);
                }
                Ok(())
            }
            // The error has been displayed.
            Err(e) if matches!(e.downcast_ref::<Error>(),
                               Some(Error::MalformedArmor(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl BodyHandler for Viewer<'_> {
    fn handle(&mut self, pgp: &Pgp, part: &Part, out: &mut dyn Write)
              -> Result<()>
    {
        tracer!(TRACE, "Viewer::handle");
        t!("{}", part.content_type());

        if part.is("multipart", "encrypted") {
            if pipeline::encrypted_handler(pgp, part, out, self)? {
                self.signatures.push(true);
            }
        } else if part.is("multipart", "signed") && part.parts.len() == 2 {
            self.signed(pgp, part, out)?;
        } else if part.is_multipart() {
            for p in &part.parts {
                self.handle(pgp, p, out)?;
            }
        } else if pipeline::is_application_pgp(part) {
            self.inline(pgp, part, out)?;
        } else if part.mime_type == "text" {
            out.write_all(&part.body)?;
            if ! part.body.is_empty() && ! part.body.ends_with(b"\n") {
                writeln!(out)?;
            }
        } else {
            write!(out, "[-- Attachment: {}", part.content_type())?;
            if let Some(name) = &part.filename {
                write!(out, ", {}", name)?;
            }
            if let Some(description) = &part.description {
                write!(out, ", {}", description)?;
            }
            write!(out, " --]\n\n")?;
        }
        Ok(())
    }
}

pub fn dispatch(ctx: &mut Context, cmd: show::Command) -> Result<()> {
    let mut message = super::read_message(&cmd.input)?;
    pipeline::check_traditional(&mut message);

    let mut viewer = Viewer {
        verify: ! cmd.no_verify,
        prefix: cmd.prefix.as_deref(),
        signatures: Vec::new(),
    };
    let mut sink = cmd.output.create(ctx.force)?;
    viewer.handle(&ctx.pgp, &message, &mut sink)?;
    sink.flush()?;

    if ! viewer.signatures.is_empty() {
        if viewer.signatures.iter().all(|&good| good) {
            qprintln!(quiet=ctx.quiet, "Good signature.");
        } else {
            qprintln!(quiet=ctx.quiet, "Warning: bad signature.");
        }
    }
    Ok(())
}
