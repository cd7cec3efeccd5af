//! Verifies detached signatures.

use std::io::Write;

use anyhow::Result;

use crate::mime::Part;
use crate::pgp::Pgp;
use crate::template::{Operation, TemplateParams};

use super::{CheckSig, SignatureStatus};

const TRACE: bool = false;

/// Verifies `signature` over `data`.
///
/// The backend's output is copied to `out`, framed by banners.
pub fn verify(pgp: &Pgp, data: &[u8], signature: &[u8], out: &mut dyn Write)
              -> Result<SignatureStatus>
{
    tracer!(TRACE, "verify");

    let scratch = pgp.invoker().scratch();
    let data_file = scratch.file_with("data-", data)?;
    let signature_file = scratch.file_with("sig-", signature)?;

    super::output_follows(out)?;
    let captured = pgp.invoker().capture(
        Operation::Verify,
        &TemplateParams {
            input: Some(data_file.path()),
            signature: Some(signature_file.path()),
            ..Default::default()
        });
    let captured = match captured {
        Ok(c) => c,
        Err(e) => {
            super::end_of_output(out)?;
            return Err(e);
        }
    };

    let check = super::copy_checksig(pgp, &captured.stdout, out)?
        .or(super::copy_checksig(pgp, &captured.stderr, out)?);
    super::end_of_output(out)?;
    t!("{:?}, {}", check, captured.status);

    Ok(match (check, captured.status.success()) {
        (CheckSig::Matched, true) => SignatureStatus::Good,
        (CheckSig::NoPattern, true) => SignatureStatus::GoodUnconfirmed,
        _ => SignatureStatus::Bad,
    })
}

/// Verifies a multipart/signed part.
///
/// The first subpart is verified, byte for byte as it was received,
/// against the body of the second.
pub fn verify_signed(pgp: &Pgp, part: &Part, out: &mut dyn Write)
                     -> Result<SignatureStatus>
{
    if ! part.is("multipart", "signed") || part.parts.len() != 2 {
        return Err(anyhow::anyhow!(
            "Expected a multipart/signed part with two subparts, got {} \
             with {}", part.content_type(), part.parts.len()));
    }

    let data = part.parts[0].original_bytes()?;
    verify(pgp, &data, &part.parts[1].body, out)
}
