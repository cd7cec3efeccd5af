//! Inline PGP, and the send-side composition of the operations.

use anyhow::Result;

use crate::armor;
use crate::charset;
use crate::error::Error;
use crate::mime::{Encoding, Part};
use crate::pgp::Pgp;
use crate::resolve::KeyList;
use crate::template::{Operation, TemplateParams};

use super::{Security, encrypt_message, sign_message};

const TRACE: bool = false;

/// Encrypts or clearsigns a text/plain part inline.
///
/// Bodies that are not US-ASCII are converted to UTF-8 first.  The
/// result carries an `x-action` parameter telling readers what was
/// done.
pub fn traditional(pgp: &Pgp, part: &Part, security: Security,
                   keylist: &KeyList)
                   -> Result<Part>
{
    tracer!(TRACE, "traditional");

    if ! part.is("text", "plain") {
        return Err(Error::NotTextPlain(part.content_type()).into());
    }

    let (body, send_charset) = if charset::is_us_ascii(part.charset()) {
        (part.body.clone(), "us-ascii")
    } else {
        let body = pgp.charsets().decode(part.charset(), &part.body)?;
        (body.into_bytes(),
         if security.encrypt { "us-ascii" } else { "utf-8" })
    };
    t!("{} bytes, sending as {}", body.len(), send_charset);

    let op = match (security.encrypt, security.sign) {
        (true, true) => Operation::EncryptSign,
        (true, false) => Operation::EncryptOnly,
        (false, _) => Operation::Clearsign,
    };
    let sign = security.sign || ! security.encrypt;
    if sign && ! pgp.ensure_passphrase()? {
        return Err(Error::Cancelled.into());
    }

    let input = pgp.invoker().scratch().file_with("plain-", &body)?;
    let run = super::run(pgp, op,
                         &TemplateParams {
                             input: Some(input.path()),
                             recipients: keylist.recipients(),
                             sign_as: pgp.config().sign_as.as_deref(),
                             ..Default::default()
                         },
                         sign)?;
    super::show_diagnostics(pgp, &run.captured.stderr)?;

    if run.captured.stdout.is_empty()
        || (! run.captured.status.success() && pgp.config().check_exit)
    {
        t!("{} failed: {}", op, run.captured.status);
        if sign && run.fed {
            pgp.void_passphrase();
        }
        return Err(if security.encrypt {
            Error::EncryptionEmptyOutput
        } else {
            Error::SigningEmptyOutput
        }.into());
    }

    let mut result = Part::leaf("text", "plain", run.captured.stdout);
    if security.encrypt {
        result.encoding = Some(Encoding::SevenBit);
        result.set_param("x-action", "pgp-encrypted");
    } else {
        result.set_param("x-action", "pgp-signed");
    }
    result.set_param("charset", send_charset);
    Ok(result)
}

/// The `x-action` values of inline PGP parts.
const ACTIONS: &[&str] = &["pgp-encrypted", "pgp-signed", "pgp-keys"];

/// Returns whether `part` is known to hold inline PGP data.
///
/// That is the case for application/pgp parts, and for text/plain
/// parts carrying an `x-action` parameter.
pub fn is_application_pgp(part: &Part) -> bool {
    part.is("application", "pgp")
        || part.is("application", "x-pgp-message")
        || (part.is("text", "plain")
            && part.param("x-action")
            .map(|a| ACTIONS.iter().any(|x| a.eq_ignore_ascii_case(x)))
            .unwrap_or(false))
}

/// Looks for inline PGP data in text parts.
///
/// Recurses into multiparts.  Text parts containing armor get
/// `format=fixed` and an `x-action` parameter, so that they are
/// handed to the legacy handler.  Returns whether any part holds
/// PGP data.
pub fn check_traditional(part: &mut Part) -> bool {
    tracer!(TRACE, "check_traditional");

    if part.is_multipart() {
        let mut found = false;
        for p in part.parts.iter_mut() {
            found |= check_traditional(p);
        }
        return found;
    }

    if part.mime_type != "text" {
        return false;
    }
    if is_application_pgp(part) {
        return true;
    }

    let (mut encrypted, mut signed, mut keys) = (false, false, false);
    for (_, line) in armor::lines(&part.body) {
        let line = line.strip_suffix(b"\r\n").unwrap_or(line);
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = [line, &b"\n"[..]].concat();
        match armor::ArmorKind::from_begin_line(&line) {
            Some(armor::ArmorKind::EncryptedMessage) => encrypted = true,
            Some(armor::ArmorKind::ClearSignedMessage) => signed = true,
            Some(armor::ArmorKind::PublicKeyBlock) => keys = true,
            None => (),
        }
    }

    let action = if encrypted {
        "pgp-encrypted"
    } else if signed {
        "pgp-signed"
    } else if keys {
        "pgp-keys"
    } else {
        return false;
    };
    t!("{} holds {}", part.content_type(), action);

    part.set_param("format", "fixed");
    part.set_param("x-action", action);
    true
}

/// Applies `security` to an outgoing part.
///
/// Inline PGP is only possible for text/plain parts.  If inline PGP
/// was chosen automatically, other parts fall back to PGP/MIME.  For
/// PGP/MIME, signing completes before encryption starts.
pub fn protect(pgp: &Pgp, part: &Part, security: Security, keylist: &KeyList)
               -> Result<Part>
{
    tracer!(TRACE, "protect");

    if security.is_empty() {
        return Ok(part.clone());
    }

    if security.inline {
        match traditional(pgp, part, security, keylist) {
            Ok(p) => return Ok(p),
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::NotTextPlain(_)) if pgp.config().auto_inline => {
                    t!("{}, falling back to PGP/MIME", e);
                    pgp.ui().notify(
                        "Inline PGP can't be used with attachments, \
                         using PGP/MIME.");
                }
                _ => return Err(e),
            },
        }
    }

    let mut part = part.clone();
    if security.sign {
        part = sign_message(pgp, &part)?;
    }
    if security.encrypt {
        part = encrypt_message(pgp, &part, keylist, false)?;
    }
    Ok(part)
}
