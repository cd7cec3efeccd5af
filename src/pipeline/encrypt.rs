//! Creates PGP/MIME encrypted messages.

use anyhow::Result;

use crate::error::Error;
use crate::mime::{Disposition, Encoding, Part};
use crate::pgp::Pgp;
use crate::resolve::KeyList;
use crate::template::{Operation, TemplateParams};

const TRACE: bool = false;

/// Encrypts `part` to the keys in `keylist`.
///
/// If `sign` is set, the backend also signs, and the passphrase is
/// asked for.  Returns a multipart/encrypted part.
pub fn encrypt_message(pgp: &Pgp, part: &Part, keylist: &KeyList, sign: bool)
                       -> Result<Part>
{
    tracer!(TRACE, "encrypt_message");

    if sign && ! pgp.ensure_passphrase()? {
        return Err(Error::Cancelled.into());
    }

    let input = pgp.invoker().scratch().file_with("plain-", &part.to_vec()?)?;
    let op = if sign { Operation::EncryptSign } else { Operation::EncryptOnly };
    t!("{} to {}", op, keylist);
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
        t!("Encryption failed: {}", run.captured.status);
        return Err(Error::EncryptionEmptyOutput.into());
    }

    let mut control = Part::leaf("application", "pgp-encrypted",
                                 b"Version: 1\n".to_vec());
    control.encoding = Some(Encoding::SevenBit);

    let mut payload = Part::leaf("application", "octet-stream",
                                 run.captured.stdout);
    payload.encoding = Some(Encoding::SevenBit);
    payload.disposition = Some(Disposition::Inline);
    payload.filename = Some("msg.asc".into());

    let mut encrypted = Part::multipart("encrypted", vec![control, payload])?;
    encrypted.set_param("protocol", "application/pgp-encrypted");
    Ok(encrypted)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    use crate::keys::test::StaticKeySource;
    use crate::pgp::test::context;
    use crate::pipeline::test::scripted;
    use crate::ui::scripted::{Reply, ScriptedUi};

    /// Writes the recipients and the plaintext inside armor.
    const ENCRYPT: &str = "\
        echo '-----BEGIN PGP MESSAGE-----'; \
        echo \"$*\"; \
        cat \"$1\"; \
        echo '-----END PGP MESSAGE-----'";

    fn keylist() -> KeyList {
        "0xAAAA1111 BBBB2222".parse().unwrap()
    }

    #[test]
    fn encrypt_only() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(scripted(&[(Operation::EncryptOnly, ENCRYPT)]),
                          &keys, &ui);

        let part = Part::text("Hello\n", "us-ascii");
        let encrypted = encrypt_message(&pgp, &part, &keylist(), false).unwrap();
        assert!(encrypted.is("multipart", "encrypted"));
        assert_eq!(encrypted.param("protocol"), Some("application/pgp-encrypted"));

        let [control, payload] = &encrypted.parts[..] else {
            panic!("expected two parts");
        };
        assert!(control.is("application", "pgp-encrypted"));
        assert_eq!(control.body, b"Version: 1\n");
        assert!(payload.is("application", "octet-stream"));
        assert_eq!(payload.filename.as_deref(), Some("msg.asc"));
        assert_eq!(payload.disposition, Some(Disposition::Inline));

        let body = String::from_utf8(payload.body.clone()).unwrap();
        assert!(body.starts_with("-----BEGIN PGP MESSAGE-----\n"));
        assert!(body.contains(" 0xAAAA1111 0xBBBB2222\n"));
        assert!(body.contains("Content-Type: text/plain"));
        assert!(ui.done());
    }

    #[test]
    fn encrypt_and_sign() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![Reply::Text(Some("secret".into()))]);
        let script = format!("read pw; {}", ENCRYPT);
        let pgp = context(scripted(&[(Operation::EncryptSign, &script)]),
                          &keys, &ui);

        let part = Part::text("Hello\n", "us-ascii");
        encrypt_message(&pgp, &part, &keylist(), true).unwrap();
        assert!(ui.done());
    }

    #[test]
    fn empty_output() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(scripted(&[(Operation::EncryptOnly, "exit 0")]),
                          &keys, &ui);

        let err = encrypt_message(&pgp, &Part::text("Hello\n", "us-ascii"),
                                  &keylist(), false).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(),
                   Some(&Error::EncryptionEmptyOutput));
    }
}
