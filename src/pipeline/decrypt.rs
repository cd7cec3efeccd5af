//! Decrypts PGP/MIME messages.

use std::io::Write;

use anyhow::Result;

use crate::error::Error;
use crate::mime::Part;
use crate::pgp::Pgp;
use crate::template::{Operation, TemplateParams};

use super::{BodyHandler, CheckSig};

const TRACE: bool = false;

/// The result of a decryption.
#[derive(Debug, Clone)]
pub struct DecryptedPart {
    /// The decrypted MIME entity.
    pub part: Part,
    /// The plaintext as emitted by the backend, with line endings
    /// normalized.
    pub raw: Vec<u8>,
    /// Whether the backend reported a good signature.
    pub good_signature: bool,
}

/// Turns CRLF line endings into LF.
fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    for line in data.split_inclusive(|&b| b == b'\n') {
        match line.strip_suffix(b"\r\n") {
            Some(l) => {
                result.extend_from_slice(l);
                result.push(b'\n');
            }
            None => result.extend_from_slice(line),
        }
    }
    result
}

/// Decrypts `ciphertext`.
///
/// The backend's diagnostics are copied to `out`, framed by banners.
/// If the backend produces nothing after the passphrase was fed to
/// it, the passphrase is forgotten.
pub fn decrypt_part(pgp: &Pgp, ciphertext: &[u8], out: &mut dyn Write)
                    -> Result<DecryptedPart>
{
    tracer!(TRACE, "decrypt_part");

    if ! pgp.ensure_passphrase()? {
        return Err(Error::Cancelled.into());
    }

    let input = pgp.invoker().scratch().file_with("enc-", ciphertext)?;
    super::output_follows(out)?;
    let run = super::run(pgp, Operation::Decrypt,
                         &TemplateParams {
                             input: Some(input.path()),
                             ..Default::default()
                         },
                         true)?;

    let check = super::copy_checksig(pgp, &run.captured.stderr, out)?;
    super::end_of_output(out)?;

    let raw = normalize_line_endings(&run.captured.stdout);
    if raw.is_empty() {
        t!("No output, {}, fed: {}", run.captured.status, run.fed);
        if run.fed {
            pgp.void_passphrase();
            if ! run.captured.status.success() {
                return Err(Error::PassphraseRejected.into());
            }
        }
        return Err(Error::DecryptionEmptyOutput.into());
    }

    Ok(DecryptedPart {
        part: Part::parse(&raw)?,
        raw,
        good_signature: check == CheckSig::Matched,
    })
}

/// Returns the encrypted payload of a multipart/encrypted part.
fn payload(part: &Part) -> Result<&Part> {
    if ! part.is("multipart", "encrypted") {
        return Err(Error::MalformedMultipart(
            format!("expected multipart/encrypted, got {}",
                    part.content_type())).into());
    }

    match &part.parts[..] {
        [control, payload]
            if control.is("application", "pgp-encrypted")
            && payload.is("application", "octet-stream") => Ok(payload),
        parts => Err(Error::MalformedMultipart(
            format!("expected an application/pgp-encrypted and an \
                     application/octet-stream part, got {}",
                    parts.iter().map(|p| p.content_type())
                    .collect::<Vec<_>>().join(", "))).into()),
    }
}

/// Decrypts a multipart/encrypted part.
pub fn decrypt_mime(pgp: &Pgp, part: &Part, out: &mut dyn Write)
                    -> Result<DecryptedPart>
{
    decrypt_part(pgp, &payload(part)?.body, out)
}

/// Decrypts a multipart/encrypted part for display.
///
/// The decrypted entity is handed to `handler`.  Returns whether the
/// backend reported a good signature.
pub fn encrypted_handler(pgp: &Pgp, part: &Part, out: &mut dyn Write,
                         handler: &mut dyn BodyHandler)
                         -> Result<bool>
{
    tracer!(TRACE, "encrypted_handler");

    let payload = match payload(part) {
        Ok(p) => p,
        Err(e) => {
            write!(out, "[-- Error: malformed PGP/MIME message! --]\n\n")?;
            return Err(e);
        }
    };

    let decrypted = decrypt_part(pgp, &payload.body, out)?;
    t!("Decrypted a {}", decrypted.part.content_type());

    write!(out, "[-- The following data is PGP/MIME encrypted --]\n\n")?;
    handler.handle(pgp, &decrypted.part, out)?;
    write!(out, "\n[-- End of PGP/MIME encrypted data --]\n")?;

    Ok(decrypted.good_signature)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    use crate::keys::test::StaticKeySource;
    use crate::pgp::test::context;
    use crate::pipeline::test::scripted;
    use crate::ui::scripted::{Reply, ScriptedUi};

    /// Decrypts by dropping the first line, if the passphrase is
    /// right.
    const DECRYPT: &str = "\
        read pw; \
        if [ \"$pw\" != secret ]; then echo 'gpg: bad passphrase' >&2; exit 2; fi; \
        echo 'gpg: Good signature from \"Alice\"' >&2; \
        sed 1d \"$1\"";

    fn encrypted(content: &[u8]) -> Part {
        let mut body = b"-----BEGIN PGP MESSAGE-----\n".to_vec();
        body.extend_from_slice(content);
        Part::multipart("encrypted", vec![
            Part::leaf("application", "pgp-encrypted", b"Version: 1\n".to_vec()),
            Part::leaf("application", "octet-stream", body),
        ]).unwrap()
    }

    struct Collect(Vec<Part>);

    impl BodyHandler for Collect {
        fn handle(&mut self, _: &Pgp, part: &Part, out: &mut dyn Write)
                  -> Result<()>
        {
            out.write_all(&part.body)?;
            self.0.push(part.clone());
            Ok(())
        }
    }

    #[test]
    fn decrypt() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![Reply::Text(Some("secret".into()))]);
        let pgp = context(scripted(&[(Operation::Decrypt, DECRYPT)]), &keys, &ui);

        let mut out = Vec::new();
        let d = decrypt_part(
            &pgp,
            b"-----BEGIN PGP MESSAGE-----\n\
              Content-Type: text/plain\r\n\r\nHello\r\n",
            &mut out).unwrap();
        assert_eq!(d.raw, b"Content-Type: text/plain\n\nHello\n");
        assert!(d.part.is("text", "plain"));
        assert_eq!(d.part.body, b"Hello\n");
        assert!(d.good_signature);
        assert!(ui.done());
    }

    #[test]
    fn rejected_passphrase_is_forgotten() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![
            Reply::Text(Some("wrong".into())),
            Reply::Text(Some("secret".into())),
        ]);
        let pgp = context(scripted(&[(Operation::Decrypt, DECRYPT)]), &keys, &ui);

        let mut out = Vec::new();
        let err = decrypt_part(&pgp, b"x\nHello\n", &mut out).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::PassphraseRejected));
        assert!(! pgp.has_passphrase());
        assert!(String::from_utf8_lossy(&out).contains("gpg: bad passphrase"));

        let mut out = Vec::new();
        decrypt_part(&pgp, b"x\nHello\n", &mut out).unwrap();
        assert!(ui.done());
    }

    #[test]
    fn empty_output_forgets_passphrase() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![
            Reply::Text(Some("wrong".into())),
            Reply::Text(Some("secret".into())),
        ]);
        // Exits successfully without decrypting anything.
        let pgp = context(scripted(&[(Operation::Decrypt,
                                      "cat >/dev/null; exit 0")]),
                          &keys, &ui);

        let mut out = Vec::new();
        let err = decrypt_part(&pgp, b"x\n", &mut out).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(),
                   Some(&Error::DecryptionEmptyOutput));
        assert!(! pgp.has_passphrase());

        // The next attempt asks again.
        let mut out = Vec::new();
        assert!(decrypt_part(&pgp, b"x\n", &mut out).is_err());
        assert!(ui.done());
    }

    #[test]
    fn cancelled_passphrase() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![Reply::Text(None)]);
        let pgp = context(scripted(&[(Operation::Decrypt, DECRYPT)]), &keys, &ui);

        let mut out = Vec::new();
        let err = decrypt_part(&pgp, b"x\n", &mut out).unwrap_err();
        assert!(Error::is_cancellation(&err));
        assert!(out.is_empty());
    }

    #[test]
    fn handler() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![Reply::Text(Some("secret".into()))]);
        let pgp = context(scripted(&[(Operation::Decrypt, DECRYPT)]), &keys, &ui);

        let mut out = Vec::new();
        let mut collect = Collect(Vec::new());
        let good = encrypted_handler(
            &pgp, &encrypted(b"Content-Type: text/plain\n\nHello\n"),
            &mut out, &mut collect).unwrap();
        assert!(good);
        assert_eq!(collect.0.len(), 1);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("[-- End of PGP output --]\n\n\
                              [-- The following data is PGP/MIME encrypted --]\n\n\
                              Hello\n\
                              \n[-- End of PGP/MIME encrypted data --]\n"));

        let d = decrypt_mime(&pgp, &encrypted(b"\nHi\n"), &mut Vec::new())
            .unwrap();
        assert_eq!(d.part.body, b"Hi\n");
    }

    #[test]
    fn malformed() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(scripted(&[(Operation::Decrypt, DECRYPT)]), &keys, &ui);

        let mut part = encrypted(b"");
        part.parts.swap(0, 1);
        let mut out = Vec::new();
        let err = encrypted_handler(&pgp, &part, &mut out,
                                    &mut Collect(Vec::new())).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::MalformedMultipart(_))));
        assert_eq!(out, b"[-- Error: malformed PGP/MIME message! --]\n\n");

        let err = decrypt_mime(&pgp, &Part::text("x", "us-ascii"),
                               &mut Vec::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::MalformedMultipart(_))));
    }
}
