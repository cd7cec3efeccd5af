//! Displays inline PGP data.
//!
//! Text bodies may carry PGP messages, clearsigned texts, and public
//! keys in ASCII armor.  Each block is run through the backend's
//! decode command, and replaced by what it yields.  Everything
//! around the blocks is copied unchanged.

use std::io::Write;

use anyhow::Result;

use crate::armor::{ArmorKind, ArmorRegion, ArmorScanner, ClearsignNormalizer};
use crate::error::Error;
use crate::pgp::Pgp;
use crate::template::{Operation, TemplateParams};

use super::CheckSig;

const TRACE: bool = false;

/// How the body is processed.
#[derive(Debug, Clone, Default)]
pub struct HandlerState<'a> {
    /// Whether the result is shown to the user.  Only then are the
    /// backend's diagnostics and the banners written.
    pub display: bool,
    /// Whether clearsigned blocks are verified.
    pub verify: bool,
    /// Prepended to every line written, e.g. a quote marker.
    pub prefix: Option<&'a str>,
    /// The charset of the body.
    pub charset: Option<&'a str>,
    /// Whether public key blocks are processed.
    pub handle_keys: bool,
}

/// The result of processing a body.
#[derive(Debug, Clone)]
pub struct LegacyOutcome {
    /// Whether there were signatures, and all of them are good.
    pub good_signature: bool,
    /// The blocks that were found.
    pub regions: Vec<ArmorRegion>,
}

fn begin_banner(kind: ArmorKind) -> &'static str {
    match kind {
        ArmorKind::EncryptedMessage => "[-- BEGIN PGP MESSAGE --]\n\n",
        ArmorKind::PublicKeyBlock => "[-- BEGIN PGP PUBLIC KEY BLOCK --]\n",
        ArmorKind::ClearSignedMessage => "[-- BEGIN PGP SIGNED MESSAGE --]\n\n",
    }
}

fn end_banner(kind: ArmorKind) -> &'static str {
    match kind {
        ArmorKind::EncryptedMessage => "[-- END PGP MESSAGE --]\n",
        ArmorKind::PublicKeyBlock => "[-- END PGP PUBLIC KEY BLOCK --]\n",
        ArmorKind::ClearSignedMessage => "[-- END PGP SIGNED MESSAGE --]\n",
    }
}

/// Copies `data`, prepending `prefix` to every line.
fn write_prefixed(data: &[u8], prefix: Option<&str>, out: &mut dyn Write)
                  -> Result<()>
{
    for line in data.split_inclusive(|&b| b == b'\n') {
        if let Some(prefix) = prefix {
            out.write_all(prefix.as_bytes())?;
        }
        out.write_all(line)?;
    }
    Ok(())
}

/// Processes a text body carrying inline PGP data.
///
/// The good signature flag is only set if some block carried a
/// signature the backend vouched for, and no block failed.
pub fn application_pgp_handler(pgp: &Pgp, body: &[u8], state: &HandlerState,
                               out: &mut dyn Write)
                               -> Result<LegacyOutcome>
{
    tracer!(TRACE, "application_pgp_handler");

    let mut maybe_good = true;
    let mut have_any = false;

    let scanner = ArmorScanner::new()
        .prefix(state.prefix)
        .handle_keys(state.handle_keys);
    let regions = scanner.scan(body, out, |block, out| {
        let kind = block.region.kind;
        let clearsigned = kind == ArmorKind::ClearSignedMessage;
        let encrypted = kind == ArmorKind::EncryptedMessage;
        t!("{:?} at {:?}", kind, block.region.range);

        if clearsigned && state.verify {
            have_any = true;
        }

        let mut output = None;
        if ! clearsigned || state.verify {
            if encrypted && ! pgp.ensure_passphrase()? {
                return Err(Error::Cancelled.into());
            }

            let input = pgp.invoker().scratch().file_with("armor-", block.raw)?;
            let run = super::run(pgp, Operation::Decode,
                                 &TemplateParams {
                                     input: Some(input.path()),
                                     ..Default::default()
                                 },
                                 encrypted);
            match run {
                Ok(run) => {
                    if state.display {
                        super::output_follows(out)?;
                        let check = super::copy_checksig(
                            pgp, &run.captured.stderr, out)?;
                        t!("{:?}, {}", check, run.captured.status);
                        if check == CheckSig::Matched {
                            have_any = true;
                        }
                        if check == CheckSig::NotMatched
                            || ! run.captured.status.success()
                        {
                            maybe_good = false;
                        }
                        writeln!(out)?;
                        super::end_of_output(out)?;
                    }
                    output = Some(run.captured.stdout);
                }
                Err(e) => match e.downcast_ref::<Error>() {
                    Some(Error::SpawnFailure(..)) => {
                        t!("{}", e);
                        maybe_good = false;
                        out.write_all(
                            b"[-- Error: unable to create PGP subprocess! --]\n")?;
                    }
                    _ => return Err(e),
                },
            }
        }

        if state.display {
            out.write_all(begin_banner(kind).as_bytes())?;
        }

        if clearsigned {
            ClearsignNormalizer::new(pgp.charsets())
                .charset(state.charset)
                .prefix(state.prefix)
                .normalize(block.raw, out)?;
        } else if let Some(output) = output {
            write_prefixed(&output, state.prefix, out)?;
        }

        if state.display {
            writeln!(out)?;
            out.write_all(end_banner(kind).as_bytes())?;
        }
        Ok(())
    })?;

    if regions.is_empty() {
        write!(out, "[-- Error: could not find beginning of PGP message! --]\n\n")?;
        return Err(Error::MalformedArmor(
            "could not find beginning of PGP message".into()).into());
    }

    Ok(LegacyOutcome {
        good_signature: maybe_good && have_any,
        regions,
    })
}
