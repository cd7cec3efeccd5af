//! The OpenPGP operations.
//!
//! Every operation writes its input to a private temporary file,
//! runs the backend on it, and collects what the backend said.  The
//! backend's diagnostics are shown to the user between banners, and
//! searched for the configured good-signature pattern.

use std::io::Write;

use anyhow::Result;

use crate::mime::Part;
use crate::pgp::Pgp;
use crate::process::{self, Captured, Channel, Channels};
use crate::template::{Operation, TemplateParams};

mod decrypt;
pub use decrypt::{DecryptedPart, decrypt_mime, decrypt_part, encrypted_handler};
mod encrypt;
pub use encrypt::encrypt_message;
mod keyring;
pub use keyring::{extract_keys_from_message, import_keys, make_key_attachment};
mod legacy;
pub use legacy::{HandlerState, LegacyOutcome, application_pgp_handler};
mod menu;
pub use menu::send_menu;
mod sign;
pub use sign::{micalg, sign_detached, sign_message};
mod traditional;
pub use traditional::{check_traditional, is_application_pgp, protect, traditional};
mod verify;
pub use verify::{verify, verify_signed};

const TRACE: bool = false;

/// Precedes the backend's diagnostics.
pub(crate) fn output_follows(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "[-- PGP output follows (current time: {}) --]",
             chrono::Local::now().format("%c"))?;
    Ok(())
}

/// Follows the backend's diagnostics.
pub(crate) fn end_of_output(out: &mut dyn Write) -> Result<()> {
    write!(out, "[-- End of PGP output --]\n\n")?;
    Ok(())
}

/// Shows what the backend wrote to stderr, if anything.
///
/// Status lines are left out.
pub(crate) fn show_diagnostics(pgp: &Pgp, stderr: &[u8]) -> Result<()> {
    let text = without_status_lines(stderr);
    if ! text.is_empty() {
        pgp.ui().show("PGP output", &String::from_utf8_lossy(&text))?;
    }
    Ok(())
}

/// Returns `input` without the backend's machine-readable status
/// lines.
fn without_status_lines(input: &[u8]) -> Vec<u8> {
    let mut text = Vec::with_capacity(input.len());
    for line in input.split_inclusive(|&b| b == b'\n') {
        if ! line.starts_with(STATUS_PREFIX) {
            text.extend_from_slice(line);
        }
    }
    text
}

/// The verdict on a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The backend succeeded and said so in the expected words.
    Good,
    /// The backend succeeded, but there is no pattern to confirm it.
    GoodUnconfirmed,
    Bad,
}

impl SignatureStatus {
    /// Returns whether the signature is to be trusted.
    pub fn is_good(&self) -> bool {
        matches!(self, SignatureStatus::Good | SignatureStatus::GoodUnconfirmed)
    }
}

/// What the good-signature filter saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSig {
    /// A line matched the pattern.
    Matched,
    /// There is a pattern, and no line matched it.
    NotMatched,
    /// No pattern is configured.
    NoPattern,
}

impl CheckSig {
    /// Combines the verdicts on two streams.
    ///
    /// A match on either stream counts.
    pub fn or(self, other: CheckSig) -> CheckSig {
        use CheckSig::*;
        match (self, other) {
            (Matched, _) | (_, Matched) => Matched,
            (NotMatched, _) | (_, NotMatched) => NotMatched,
            (NoPattern, NoPattern) => NoPattern,
        }
    }
}

/// The status-line prefix of GnuPG's machine readable output.
const STATUS_PREFIX: &[u8] = b"[GNUPG:] ";

/// Copies backend output, looking for the good-signature pattern.
///
/// Every line is matched against the pattern.  Status lines are
/// dropped from the copy.  Without a pattern, the input is copied
/// unchanged.
pub fn copy_checksig(pgp: &Pgp, input: &[u8], out: &mut dyn Write)
                     -> Result<CheckSig>
{
    tracer!(TRACE, "copy_checksig");

    let pattern = if let Some(p) = &pgp.config().good_signature {
        p
    } else {
        t!("No pattern");
        out.write_all(input)?;
        return Ok(CheckSig::NoPattern);
    };

    let mut result = CheckSig::NotMatched;
    for line in input.split_inclusive(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if pattern.is_match(&String::from_utf8_lossy(line)) {
            t!("{:?} matches", String::from_utf8_lossy(line));
            result = CheckSig::Matched;
        }

        if line.starts_with(STATUS_PREFIX) {
            continue;
        }
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }

    Ok(result)
}

/// What to do to an outgoing message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Security {
    pub encrypt: bool,
    pub sign: bool,
    /// Use inline PGP instead of PGP/MIME.
    pub inline: bool,
}

impl Security {
    /// Returns whether nothing is to be done.
    pub fn is_empty(&self) -> bool {
        ! self.encrypt && ! self.sign
    }
}

/// Displays the parts found inside encrypted data.
pub trait BodyHandler {
    fn handle(&mut self, pgp: &Pgp, part: &Part, out: &mut dyn Write)
              -> Result<()>;
}

/// A finished backend run.
pub(crate) struct Run {
    pub captured: Captured,
    /// Whether a passphrase was written to the backend.
    pub fed: bool,
}

/// Runs `op` to completion.
///
/// If `passphrase` is set, the passphrase is written to the
/// backend's stdin.  stdout and stderr are collected in temporary
/// files.
pub(crate) fn run(pgp: &Pgp, op: Operation, params: &TemplateParams,
                  passphrase: bool)
                  -> Result<Run>
{
    tracer!(TRACE, "run");

    let params = TemplateParams {
        passphrase: passphrase && pgp.feeds_passphrase(),
        ..params.clone()
    };

    let scratch = pgp.invoker().scratch();
    let stdout = scratch.file("out-")?;
    let stderr = scratch.file("err-")?;
    let stdin = if passphrase { Channel::Pipe } else { Channel::Null };
    let mut invocation = pgp.invoker().invoke(
        op, &params,
        Channels::default()
            .stdin(stdin)
            .stdout(Channel::temp(&stdout)?)
            .stderr(Channel::temp(&stderr)?))?;

    let fed = if passphrase {
        pgp.feed_passphrase(invocation.stdin()?)?
    } else {
        false
    };
    let status = invocation.wait()?;
    t!("{} exited with {}", op, status);

    Ok(Run {
        captured: Captured {
            status,
            stdout: process::read_back(&stdout)?,
            stderr: process::read_back(&stderr)?,
        },
        fed,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    use regex::Regex;

    use crate::config::Config;
    use crate::keys::test::StaticKeySource;
    use crate::pgp::test::context;
    use crate::template::{CommandTemplate, Templates};
    use crate::ui::scripted::ScriptedUi;

    /// Returns a configuration running `script` through `sh -c` for
    /// the given operations.
    ///
    /// The script sees the input file as `$1`, and for verify, the
    /// signature file as `$2`.  Encryption gets the recipients after
    /// the input file, export gets them instead of it.
    pub(crate) fn scripted(ops: &[(Operation, &str)]) -> Config {
        let mut templates = Templates::default();
        for (op, script) in ops {
            let args: &[&str] = match op {
                Operation::Verify => &["%f", "%s"],
                Operation::EncryptOnly | Operation::EncryptSign =>
                    &["%f", "%r"],
                Operation::Export => &["%r"],
                _ => &["%f"],
            };
            templates.set(*op, CommandTemplate::new(
                ["sh", "-c", *script, "sh"].iter().chain(args).copied())
                          .unwrap());
        }
        Config {
            templates,
            ..Default::default()
        }
    }

    #[test]
    fn checksig() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(Config::default(), &keys, &ui);

        let input = b"[GNUPG:] GOODSIG 1234\r\n\
                      gpg: Signature made today\n\
                      gpg: Good signature from \"Alice\"";
        let mut out = Vec::new();
        assert_eq!(copy_checksig(&pgp, input, &mut out).unwrap(),
                   CheckSig::Matched);
        assert_eq!(out, b"gpg: Signature made today\n\
                          gpg: Good signature from \"Alice\"\n");

        let mut out = Vec::new();
        assert_eq!(copy_checksig(&pgp, b"gpg: BAD signature\n", &mut out).unwrap(),
                   CheckSig::NotMatched);
        assert_eq!(out, b"gpg: BAD signature\n");
    }

    #[test]
    fn checksig_matches_status_lines() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let config = Config {
            good_signature: Some(Regex::new("^\\[GNUPG:\\] GOODSIG").unwrap()),
            ..Default::default()
        };
        let pgp = context(config, &keys, &ui);

        let mut out = Vec::new();
        assert_eq!(copy_checksig(&pgp, b"[GNUPG:] GOODSIG 1234\n", &mut out)
                   .unwrap(),
                   CheckSig::Matched);
        assert!(out.is_empty());
    }

    #[test]
    fn checksig_without_pattern() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let config = Config {
            good_signature: None,
            ..Default::default()
        };
        let pgp = context(config, &keys, &ui);

        let input = b"[GNUPG:] GOODSIG 1234\nanything";
        let mut out = Vec::new();
        assert_eq!(copy_checksig(&pgp, input, &mut out).unwrap(),
                   CheckSig::NoPattern);
        assert_eq!(out, input);
    }

    #[test]
    fn diagnostics_without_status_lines() {
        let keys = StaticKeySource::default();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(Config::default(), &keys, &ui);

        show_diagnostics(&pgp, b"[GNUPG:] KEY_CONSIDERED 1234 0\n\
                                 gpg: using \"Alice\" as default key\n\
                                 [GNUPG:] SIG_CREATED D 1 8 00\n").unwrap();
        show_diagnostics(&pgp, b"[GNUPG:] BEGIN_SIGNING H8\n").unwrap();
        assert_eq!(&ui.shown.borrow()[..],
                   &[("PGP output".to_string(),
                      "gpg: using \"Alice\" as default key\n".to_string())]);
    }

    #[test]
    fn combining() {
        use CheckSig::*;
        assert_eq!(NotMatched.or(Matched), Matched);
        assert_eq!(NoPattern.or(NoPattern), NoPattern);
        assert_eq!(NotMatched.or(NotMatched), NotMatched);
    }
}
