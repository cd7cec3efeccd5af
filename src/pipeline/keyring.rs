//! Moves keys between messages and the backend's keyring.

use anyhow::Result;

use crate::error::Error;
use crate::keys::{KeyFlags, Keyring};
use crate::mime::Part;
use crate::pgp::Pgp;
use crate::resolve;
use crate::template::{Operation, TemplateParams};

use super::{HandlerState, application_pgp_handler};

const TRACE: bool = false;

/// Imports the keys in `data` into the public keyring.
///
/// What the backend says is shown to the user.  Returns whether the
/// backend succeeded.
pub fn import_keys(pgp: &Pgp, data: &[u8]) -> Result<bool> {
    tracer!(TRACE, "import_keys");

    let input = pgp.invoker().scratch().file_with("keys-", data)?;
    let captured = pgp.invoker().capture(Operation::Import, &TemplateParams {
        input: Some(input.path()),
        ..Default::default()
    })?;
    t!("Import exited with {}", captured.status);

    let mut report = captured.stdout;
    report.extend_from_slice(&captured.stderr);
    super::show_diagnostics(pgp, &report)?;
    Ok(captured.status.success())
}

/// Imports the keys carried in a message body.
///
/// Encrypted and signed blocks are decoded first, so that keys
/// inside them are found too.  Key blocks are handed to the backend
/// as they are.
pub fn extract_keys_from_message(pgp: &Pgp, body: &[u8]) -> Result<bool> {
    tracer!(TRACE, "extract_keys_from_message");

    let state = HandlerState {
        handle_keys: false,
        ..Default::default()
    };
    let mut decoded = Vec::new();
    let data = match application_pgp_handler(pgp, body, &state, &mut decoded) {
        Ok(outcome) => {
            t!("Decoded {} blocks", outcome.regions.len());
            &decoded[..]
        }
        Err(e) if matches!(e.downcast_ref::<Error>(),
                           Some(Error::MalformedArmor(_))) => {
            t!("Nothing to decode: {}", e);
            body
        }
        Err(e) => return Err(e),
    };

    import_keys(pgp, data)
}

/// Exports a public key as an attachment.
///
/// If `keyid` is not given, the user is asked for one.  The
/// principal key is exported, even if a subkey was picked.
pub fn make_key_attachment(pgp: &Pgp, keyid: Option<&str>) -> Result<Part> {
    tracer!(TRACE, "make_key_attachment");

    let key = match keyid {
        Some(id) => resolve::key_by_string(pgp, id, KeyFlags::EMPTY,
                                           Keyring::Public)?,
        None => resolve::ask_for_key(pgp, "Please enter the key ID: ", None,
                                     KeyFlags::EMPTY, Keyring::Public)?,
    };
    let id = format!("0x{}", key.principal().display_id(pgp.config().long_ids));
    t!("Exporting {}", id);

    let recipients = [id.clone()];
    let captured = pgp.invoker().capture(Operation::Export, &TemplateParams {
        recipients: &recipients,
        ..Default::default()
    })?;
    t!("Export exited with {}, {} bytes of stderr",
       captured.status, captured.stderr.len());
    if captured.stdout.is_empty() {
        return Err(anyhow::anyhow!("Exporting key {} failed", id));
    }

    let mut part = Part::leaf("application", "pgp-keys", captured.stdout);
    part.description = Some(format!("PGP Key {}.", id));
    Ok(part)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    use crate::config::Config;
    use crate::keys::test::{ALICE, StaticKeySource};
    use crate::pgp::test::context;
    use crate::pipeline::test::scripted;
    use crate::ui::Selection;
    use crate::ui::scripted::{Reply, ScriptedUi};

    const EXPORT: &str = "\
        echo '-----BEGIN PGP PUBLIC KEY BLOCK-----'; \
        echo \"$1\"; \
        echo '-----END PGP PUBLIC KEY BLOCK-----'";

    /// Reports the key blocks it was given.
    const IMPORT: &str = "\
        echo \"gpg: $(grep -c 'BEGIN PGP PUBLIC KEY BLOCK' \"$1\") key blocks\" >&2; \
        grep -q 'secret text' \"$1\" && echo 'gpg: found the decrypted text' >&2; \
        exit 0";

    fn config(ops: &[(Operation, &str)]) -> Config {
        Config {
            check_trust: false,
            ..scripted(ops)
        }
    }

    #[test]
    fn import() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(config(&[(Operation::Import, IMPORT)]), &keys, &ui);

        assert!(import_keys(&pgp, b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n")
                .unwrap());
        assert_eq!(ui.shown.borrow().as_slice(),
                   &[("PGP output".to_string(), "gpg: 1 key blocks\n".to_string())]);
    }

    #[test]
    fn import_failure() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(config(&[(Operation::Import, "echo nope >&2; exit 2")]),
                          &keys, &ui);

        assert!(! import_keys(&pgp, b"garbage").unwrap());
        assert_eq!(ui.shown.borrow()[0].1, "nope\n");
    }

    #[test]
    fn extract_from_plain_body() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(config(&[(Operation::Import, IMPORT)]), &keys, &ui);

        let body = b"Here is my key:\n\
                     -----BEGIN PGP PUBLIC KEY BLOCK-----\n\
                     a2V5\n\
                     -----END PGP PUBLIC KEY BLOCK-----\n";
        assert!(extract_keys_from_message(&pgp, body).unwrap());
        assert_eq!(ui.shown.borrow()[0].1, "gpg: 1 key blocks\n");
    }

    #[test]
    fn extract_from_encrypted_body() {
        let decode = "read pw; grep -v -- '-----' \"$1\"";
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![Reply::Text(Some("secret".into()))]);
        let pgp = context(config(&[(Operation::Import, IMPORT),
                                   (Operation::Decode, decode)]),
                          &keys, &ui);

        let body = b"-----BEGIN PGP MESSAGE-----\n\
                     secret text\n\
                     -----END PGP MESSAGE-----\n\
                     -----BEGIN PGP PUBLIC KEY BLOCK-----\n\
                     a2V5\n\
                     -----END PGP PUBLIC KEY BLOCK-----\n";
        assert!(extract_keys_from_message(&pgp, body).unwrap());
        assert_eq!(ui.shown.borrow()[0].1,
                   "gpg: 1 key blocks\ngpg: found the decrypted text\n");
        assert!(ui.done());
    }

    #[test]
    fn attachment() {
        let keys = StaticKeySource::new(ALICE);
        let ui = ScriptedUi::new(vec![Reply::Select(Selection::Chosen(0))]);
        let pgp = context(config(&[(Operation::Export, EXPORT)]), &keys, &ui);

        // The subkey is exported by its principal key.
        let part = make_key_attachment(&pgp, Some("0xAAAA2222")).unwrap();
        assert!(part.is("application", "pgp-keys"));
        assert_eq!(part.description.as_deref(), Some("PGP Key 0xAAAA1111."));
        assert_eq!(part.body, b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n\
                                0xAAAA1111\n\
                                -----END PGP PUBLIC KEY BLOCK-----\n");
    }

    #[test]
    fn attachment_asks_for_key() {
        let keys = StaticKeySource::new(ALICE);
        let ui = ScriptedUi::new(vec![
            Reply::Text(Some("alice".into())),
            Reply::Select(Selection::Chosen(0)),
        ]);
        let pgp = context(config(&[(Operation::Export, EXPORT)]), &keys, &ui);

        let part = make_key_attachment(&pgp, None).unwrap();
        assert_eq!(part.description.as_deref(), Some("PGP Key 0xAAAA1111."));
        assert_eq!(ui.log.borrow()[0], "Please enter the key ID: ");
        assert!(ui.done());
    }

    #[test]
    fn attachment_cancelled() {
        let keys = StaticKeySource::new(ALICE);
        let ui = ScriptedUi::new(vec![Reply::Text(None)]);
        let pgp = context(config(&[(Operation::Export, EXPORT)]), &keys, &ui);

        let err = make_key_attachment(&pgp, None).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::Cancelled));
    }
}
