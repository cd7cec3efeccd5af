//! Backend command templates.
//!
//! Every backend operation is described by an argument vector with
//! placeholders.  Templates are expanded into an argument vector
//! without involving a shell, so file names are never interpreted.
//!
//! Within an element:
//!
//!   - `%f` is replaced by the input file,
//!   - `%s` by the signature file,
//!   - `%k` by the keyring,
//!   - `%a` by the key to sign with,
//!   - `%%` by a literal `%`.
//!
//! An element containing `%r` is repeated once per recipient (or
//! search hint), with `%r` replaced.  An element of the form
//! `%?X?words?` expands to the whitespace-separated `words` if `X` is
//! set, and to nothing otherwise.  `X` is one of `p` (a passphrase is
//! being fed), `a` (a key to sign with is given), `k` (a keyring is
//! configured), `r` (there are recipients), `s` (there is a signature
//! file), and `f` (there is an input file).

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;

/// The operations the backend performs for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// Decodes an application/pgp body: decrypts or verifies inline
    /// data.
    Decode,
    /// Verifies a detached signature.
    Verify,
    /// Decrypts a PGP/MIME message.
    Decrypt,
    /// Creates a detached signature.
    Sign,
    /// Creates a cleartext signature.
    Clearsign,
    /// Encrypts without signing.
    EncryptOnly,
    /// Encrypts and signs.
    EncryptSign,
    /// Imports keys.
    Import,
    /// Exports a public key.
    Export,
    /// Displays a key's fingerprint and signatures.
    VerifyKey,
    /// Lists public keys in colon format.
    ListPubring,
    /// Lists secret keys in colon format.
    ListSecring,
    /// Fetches keys for an address from the network.
    GetKeys,
}

impl Operation {
    /// All operations, sorted by name.
    pub const ALL: &'static [Operation] = &[
        Operation::Clearsign,
        Operation::Decode,
        Operation::Decrypt,
        Operation::EncryptOnly,
        Operation::EncryptSign,
        Operation::Export,
        Operation::GetKeys,
        Operation::Import,
        Operation::ListPubring,
        Operation::ListSecring,
        Operation::Sign,
        Operation::Verify,
        Operation::VerifyKey,
    ];

    /// Returns the name used in the configuration file.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Decode => "decode",
            Operation::Verify => "verify",
            Operation::Decrypt => "decrypt",
            Operation::Sign => "sign",
            Operation::Clearsign => "clearsign",
            Operation::EncryptOnly => "encrypt-only",
            Operation::EncryptSign => "encrypt-sign",
            Operation::Import => "import",
            Operation::Export => "export",
            Operation::VerifyKey => "verify-key",
            Operation::ListPubring => "list-pubring",
            Operation::ListSecring => "list-secring",
            Operation::GetKeys => "get-keys",
        }
    }

    /// Returns the template used if none is configured.
    ///
    /// The defaults drive GnuPG.
    pub fn default_template(&self) -> CommandTemplate {
        const COMMON: &[&str] = &[
            "gpg", "--status-fd=2",
            "%?p?--pinentry-mode loopback --passphrase-fd 0?",
            "--no-verbose", "--quiet", "--batch",
        ];
        const LIST: &[&str] = &[
            "gpg", "--no-verbose", "--batch", "--with-colons",
            "%?k?--keyring %k?",
        ];

        let (common, specific): (&[&str], &[&str]) = match self {
            Operation::Decode | Operation::Decrypt =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?", "%f"]),
            Operation::Verify =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?",
                           "--verify", "%s", "%f"]),
            Operation::Sign =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?",
                           "--armor", "--detach-sign", "--textmode",
                           "%?a?-u %a?", "%f"]),
            Operation::Clearsign =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?",
                           "--armor", "--textmode", "--clearsign",
                           "%?a?-u %a?", "%f"]),
            Operation::EncryptOnly =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?",
                           "--armor", "--always-trust", "--encrypt",
                           "--textmode", "--recipient=%r", "--", "%f"]),
            Operation::EncryptSign =>
                (COMMON, &["--output", "-", "%?k?--keyring %k?",
                           "--armor", "--always-trust", "--encrypt",
                           "--textmode", "--sign", "%?a?-u %a?",
                           "--recipient=%r", "--", "%f"]),
            Operation::Import =>
                (&["gpg", "--no-verbose", "--batch"],
                 &["%?k?--keyring %k?", "--import", "%f"]),
            Operation::Export =>
                (&["gpg", "--no-verbose", "--batch"],
                 &["%?k?--keyring %k?", "--export", "--armor", "%r"]),
            Operation::VerifyKey =>
                (&["gpg", "--no-verbose", "--batch"],
                 &["%?k?--keyring %k?", "--fingerprint", "--check-sigs",
                   "%r"]),
            Operation::ListPubring =>
                (LIST, &["--list-keys", "%r"]),
            Operation::ListSecring =>
                (LIST, &["--list-secret-keys", "%r"]),
            Operation::GetKeys => (&[], &[]),
        };

        CommandTemplate {
            argv: common.iter().chain(specific.iter())
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL.iter()
            .find(|op| op.name() == s)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!(
                "Unknown operation {:?}, valid operations are: {}",
                s,
                Operation::ALL.iter().map(|op| op.name())
                    .collect::<Vec<_>>().join(", ")))
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateParams<'a> {
    /// The input file (`%f`).
    pub input: Option<&'a Path>,
    /// The signature file (`%s`).
    pub signature: Option<&'a Path>,
    /// The keyring (`%k`).
    pub keyring: Option<&'a Path>,
    /// Recipients or search hints (`%r`).
    pub recipients: &'a [String],
    /// Whether a passphrase is written to the backend's stdin.
    pub passphrase: bool,
    /// The key to sign with (`%a`).
    pub sign_as: Option<&'a str>,
}

impl TemplateParams<'_> {
    fn is_set(&self, flag: char) -> bool {
        match flag {
            'p' => self.passphrase,
            'a' => self.sign_as.is_some(),
            'k' => self.keyring.is_some(),
            'r' => ! self.recipients.is_empty(),
            's' => self.signature.is_some(),
            'f' => self.input.is_some(),
            _ => false,
        }
    }
}

/// The condition flags that may be used in `%?X?...?`.
const CONDITIONS: &str = "paksrf";

/// The placeholders that may follow a `%`.
const PLACEHOLDERS: &str = "fskar%";

/// An element of a template, classified.
enum Element<'t> {
    Conditional(char, &'t str),
    Repeated(&'t str),
    Plain(&'t str),
}

impl<'t> Element<'t> {
    fn parse(element: &'t str) -> Result<Self> {
        if let Some(rest) = element.strip_prefix("%?") {
            let mut chars = rest.chars();
            let flag = chars.next();
            let words = chars.as_str().strip_prefix('?')
                .and_then(|w| w.strip_suffix('?'));
            match (flag, words) {
                (Some(flag), Some(words)) if CONDITIONS.contains(flag) => {
                    for word in words.split_whitespace() {
                        check_placeholders(word)?;
                    }
                    Ok(Element::Conditional(flag, words))
                }
                _ => Err(anyhow::anyhow!(
                    "Malformed conditional {:?}, expected %?X?words? \
                     where X is one of {}", element,
                    CONDITIONS.chars().map(String::from)
                        .collect::<Vec<_>>().join(", "))),
            }
        } else {
            check_placeholders(element)?;
            if element.replace("%%", "").contains("%r") {
                Ok(Element::Repeated(element))
            } else {
                Ok(Element::Plain(element))
            }
        }
    }
}

/// Checks that all placeholders in `element` are known.
fn check_placeholders(element: &str) -> Result<()> {
    let mut chars = element.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some(p) if PLACEHOLDERS.contains(p) => (),
                Some(p) => return Err(anyhow::anyhow!(
                    "Unknown placeholder %{} in {:?}", p, element)),
                None => return Err(anyhow::anyhow!(
                    "Dangling % at the end of {:?}", element)),
            }
        }
    }
    Ok(())
}

/// Replaces the placeholders in `element`.
fn substitute(element: &str, params: &TemplateParams, recipient: Option<&str>)
              -> Result<OsString>
{
    fn path(p: Option<&Path>, what: &str) -> Result<OsString> {
        p.map(|p| p.as_os_str().to_os_string())
            .ok_or_else(|| anyhow::anyhow!("No {} given", what))
    }

    let mut result = OsString::new();
    let mut chars = element.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            let mut buf = [0; 4];
            result.push(c.encode_utf8(&mut buf));
            continue;
        }

        match chars.next() {
            Some('f') => result.push(path(params.input, "input file")?),
            Some('s') => result.push(path(params.signature, "signature file")?),
            Some('k') => result.push(path(params.keyring, "keyring")?),
            Some('a') => result.push(params.sign_as.ok_or_else(
                || anyhow::anyhow!("No key to sign with given"))?),
            Some('r') => result.push(recipient.ok_or_else(
                || anyhow::anyhow!("No recipient given"))?),
            Some('%') => result.push("%"),
            Some(p) => return Err(anyhow::anyhow!(
                "Unknown placeholder %{} in {:?}", p, element)),
            None => return Err(anyhow::anyhow!(
                "Dangling % at the end of {:?}", element)),
        }
    }

    Ok(result)
}

/// Expands one word, repeating it per recipient if need be.
fn expand_word(word: &str, params: &TemplateParams, argv: &mut Vec<OsString>)
               -> Result<()>
{
    match Element::parse(word)? {
        Element::Repeated(w) => for r in params.recipients {
            argv.push(substitute(w, params, Some(r))?);
        },
        Element::Plain(w) => argv.push(substitute(w, params, None)?),
        Element::Conditional(..) => return Err(anyhow::anyhow!(
            "Conditionals can't be nested: {:?}", word)),
    }
    Ok(())
}

/// A command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    /// Returns a template, validating its placeholders.
    ///
    /// An empty argument vector disables the operation.
    pub fn new<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        for element in &argv {
            Element::parse(element)?;
        }
        if let Some(program) = argv.first() {
            if program.contains('%') {
                return Err(anyhow::anyhow!(
                    "The program name may not contain placeholders: {:?}",
                    program));
            }
        }
        Ok(CommandTemplate { argv })
    }

    /// Returns whether the operation is disabled.
    pub fn is_disabled(&self) -> bool {
        self.argv.is_empty()
    }

    /// Returns the unexpanded elements.
    pub fn elements(&self) -> &[String] {
        &self.argv
    }

    /// Expands the template.
    ///
    /// The first element of the result is the program to run.
    pub fn expand(&self, params: &TemplateParams) -> Result<Vec<OsString>> {
        let mut argv = Vec::with_capacity(self.argv.len());
        for element in &self.argv {
            match Element::parse(element)? {
                Element::Conditional(flag, words) => {
                    if params.is_set(flag) {
                        for word in words.split_whitespace() {
                            expand_word(word, params, &mut argv)?;
                        }
                    }
                }
                _ => expand_word(element, params, &mut argv)?,
            }
        }
        Ok(argv)
    }
}

/// The configured templates.
///
/// Operations without a configured template use the default.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    configured: BTreeMap<Operation, CommandTemplate>,
}

impl Templates {
    /// Configures the template for `op`.
    pub fn set(&mut self, op: Operation, template: CommandTemplate) {
        self.configured.insert(op, template);
    }

    /// Returns the template for `op`.
    pub fn get(&self, op: Operation) -> CommandTemplate {
        self.configured.get(&op).cloned()
            .unwrap_or_else(|| op.default_template())
    }
}
