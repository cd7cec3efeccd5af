//! Lets the user choose how to protect an outgoing message.

use anyhow::Result;

use crate::error::Error;
use crate::keys::{KeyFlags, Keyring};
use crate::pgp::Pgp;
use crate::resolve;

use super::Security;

const TRACE: bool = false;

/// Asks the user how to protect a message.
///
/// Picking a key to sign with changes the configured `sign-as` key
/// for the rest of the session, and forgets the passphrase.  If the
/// user cancels, `security` is kept.
pub fn send_menu(pgp: &mut Pgp, mut security: Security) -> Result<Security> {
    tracer!(TRACE, "send_menu");

    if pgp.config().auto_inline && security.is_empty() {
        security.inline = true;
    }

    let prompt = format!(
        "PGP (e)ncrypt, (s)ign, sign (a)s, (b)oth, {}, or (c)lear? ",
        if security.inline { "PGP/M(i)ME" } else { "(i)nline" });
    let choice = pgp.ui().prompt_choice(&prompt, "esabifc")?;
    t!("{:?}", choice);

    match choice {
        Some('e') => {
            security.encrypt = true;
            security.sign = false;
        }
        Some('s') => {
            security.sign = true;
            security.encrypt = false;
        }
        Some('a') => {
            // Any secret key will do, regardless of trust.
            let check_trust = pgp.config().check_trust;
            pgp.config_mut().check_trust = false;
            let key = resolve::ask_for_key(pgp, "Sign as: ", None,
                                           KeyFlags::CAN_SIGN, Keyring::Secret);
            pgp.config_mut().check_trust = check_trust;

            match key {
                Ok(key) => {
                    let id = format!(
                        "0x{}", key.key().display_id(pgp.config().long_ids));
                    t!("Signing as {}", id);
                    pgp.config_mut().sign_as = Some(id);
                    security.sign = true;
                    pgp.void_passphrase();
                }
                Err(e) if Error::is_cancellation(&e) => t!("{}", e),
                Err(e) => return Err(e),
            }
        }
        Some('b') => {
            security.encrypt = true;
            security.sign = true;
        }
        Some('i') => {
            if security.is_empty() {
                security.inline = false;
            } else {
                security.inline = ! security.inline;
            }
        }
        Some('f') | Some('c') => security = Security::default(),
        _ => (),
    }

    if security.is_empty() {
        security = Security::default();
    }
    Ok(security)
}
