//! Configuration model and file parsing.

use std::{
    collections::HashSet,
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use regex::Regex;

use toml_edit::{
    DocumentMut,
    Item,
    Value,
};

use crate::entry;
use crate::select::SortOrder;
use crate::template::{CommandTemplate, Operation, Templates};

/// The default passphrase timeout.
pub const DEFAULT_PASSPHRASE_TIMEOUT: Duration = Duration::from_secs(300);

/// The default pattern recognizing a good signature in the backend's
/// diagnostics.
pub const DEFAULT_GOOD_SIGNATURE: &str = "^gpg: Good signature from";

/// Represents configuration at runtime.
///
/// This struct is manipulated when parsing the configuration file.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a passphrase is cached.
    pub passphrase_timeout: Duration,
    /// Whether to leave passphrases to the backend's agent.
    pub use_agent: bool,
    /// Recognizes a good signature in the backend's diagnostics.
    pub good_signature: Option<Regex>,
    /// Whether a non-zero exit status of the backend is an error.
    pub check_exit: bool,
    pub keyring: Option<PathBuf>,
    /// Whether to ask before using keys that are not fully trusted.
    pub check_trust: bool,
    pub show_unusable: bool,
    pub long_ids: bool,
    /// Whether to refer to subkeys by their principal key.
    pub ignore_subkeys: bool,
    pub sort: SortOrder,
    pub entry_format: String,
    pub sign_as: Option<String>,
    /// Appended to mailboxes without a domain.
    pub hostname: Option<String>,
    /// Whether to use inline PGP by default.
    pub auto_inline: bool,
    pub templates: Templates,
    /// Maps address patterns to key IDs.
    pub crypt_hooks: Vec<(Regex, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            passphrase_timeout: DEFAULT_PASSPHRASE_TIMEOUT,
            use_agent: false,
            good_signature: Regex::new(DEFAULT_GOOD_SIGNATURE).ok(),
            check_exit: true,
            keyring: None,
            check_trust: true,
            show_unusable: false,
            long_ids: false,
            ignore_subkeys: true,
            sort: SortOrder::default(),
            entry_format: entry::DEFAULT_FORMAT.into(),
            sign_as: None,
            hostname: None,
            auto_inline: false,
            templates: Templates::default(),
            crypt_hooks: Vec::new(),
        }
    }
}

impl Config {
    /// Returns the key ID configured for `mailbox`.
    ///
    /// The first matching hook wins.
    pub fn crypt_hook(&self, mailbox: &str) -> Option<&str> {
        self.crypt_hooks.iter()
            .find(|(re, _)| re.is_match(mailbox))
            .map(|(_, keyid)| keyid.as_str())
    }
}

/// Holds the document tree of the configuration file.
#[derive(Debug, Default)]
pub struct ConfigFile {
    doc: DocumentMut,
}

impl ConfigFile {
    /// A template for the configuration containing the default
    /// values.
    const TEMPLATE: &'static str = "\
# Configuration template for pgp-classic <VERSION>
<CONFIG-PATH-HINT>

[passphrase]
#timeout = <DEFAULT-TIMEOUT>
#use-agent = false

[verify]
# An empty pattern disables the check.
#good-signature = <DEFAULT-GOOD-SIGNATURE>

[backend]
#check-exit = true
# keyring = \"/path/to/pubring.kbx\"

[keys]
#check-trust = true
#show-unusable = false
#long-ids = false
#ignore-subkeys = true
#sort = <DEFAULT-SORT>
#entry-format = <DEFAULT-ENTRY-FORMAT>
# sign-as = \"0x12345678\"
# hostname = \"example.org\"
#auto-inline = false

# Each command is an argument vector.  An empty vector disables the
# operation.
[commands]
<DEFAULT-COMMANDS>

# Maps address patterns to key IDs.
[crypt-hooks]
# \"^alice@example\\\\.org$\" = \"0x12345678\"
";

    /// Patterns to match on in `Self::TEMPLATE` to be replaced with
    /// the default values.
    const TEMPLATE_PATTERNS: &'static [&'static str] = &[
        "<VERSION>",
        "<CONFIG-PATH-HINT>",
        "<DEFAULT-TIMEOUT>",
        "<DEFAULT-GOOD-SIGNATURE>",
        "<DEFAULT-SORT>",
        "<DEFAULT-ENTRY-FORMAT>",
        "<DEFAULT-COMMANDS>",
    ];

    /// Returns a configuration template with the defaults.
    fn config_template(path: Option<&Path>) -> Result<String> {
        let ac = AhoCorasick::new(Self::TEMPLATE_PATTERNS)?;

        let commands = Operation::ALL.iter()
            .map(|op| format!("#{} = {:?}", op,
                              op.default_template().elements()))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ac.replace_all(Self::TEMPLATE, &[
            &env!("CARGO_PKG_VERSION").to_string(),
            &if let Some(path) = path {
                format!(
                    "\n\
                     # To use it, edit it to your liking and write it to\n\
                     # {}",
                    path.display())
            } else {
                "".into()
            },
            &format!("{:?}", humantime::format_duration(
                DEFAULT_PASSPHRASE_TIMEOUT).to_string()),
            &format!("{:?}", DEFAULT_GOOD_SIGNATURE),
            &format!("{:?}", SortOrder::default().to_string()),
            &format!("{:?}", entry::DEFAULT_FORMAT),
            &commands,
        ]))
    }

    /// Returns the default configuration in template form.
    ///
    /// All the configuration options with their defaults are
    /// commented out.
    pub fn default_template(path: Option<&Path>) -> Result<Self> {
        let template = Self::config_template(path)?;
        let doc: DocumentMut = template.parse()
            .context("Parsing default configuration failed")?;
        Ok(Self {
            doc,
        })
    }

    /// Returns the default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pgp-classic").join("config.toml"))
    }

    /// Reads the configuration file.
    ///
    /// A missing file is treated like the template, i.e. the defaults
    /// are used.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::NotFound =>
                Self::config_template(Some(path))?,
            Err(e) => return Err(anyhow::Error::from(e).context(
                format!("Reading configuration file {} failed",
                        path.display()))),
        };

        let doc: DocumentMut = raw.parse()
            .with_context(|| format!("Parsing configuration file {} failed",
                                     path.display()))?;
        Ok(Self {
            doc,
        })
    }

    /// Validates the configuration, and returns it.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::default();
        apply_schema(&mut Some(&mut config), None, self.doc.iter(),
                     TOP_LEVEL_SCHEMA)?;
        Ok(config)
    }

    /// Verifies the configuration.
    pub fn verify(&self) -> Result<()> {
        apply_schema(&mut None, None, self.doc.iter(), TOP_LEVEL_SCHEMA)
    }

    /// Writes the configuration to the given writer.
    pub fn dump(&self, sink: &mut dyn io::Write) -> Result<()> {
        write!(sink, "{}", self.doc)?;
        Ok(())
    }
}

/// Validates a configuration section using a schema, and optionally
/// applies changes to the configuration.
///
/// Returns an error if a key is unknown.
///
/// known_keys better be lowercase.
fn apply_schema<'toml>(config: &mut Option<&mut Config>,
                       path: Option<&str>,
                       section: toml_edit::Iter<'toml>,
                       schema: Schema) -> Result<()> {
    let section = section.collect::<Vec<_>>();
    let known_keys: Vec<_> =
        schema.iter().map(|(key, _)| *key).collect();

    // Schema keys better be lowercase.
    debug_assert!(known_keys.iter().all(|&s| &s.to_lowercase() == s),
                  "keys in schema must be lowercase");

    // Schema keys better be sorted.
    debug_assert!(known_keys.windows(2).all(|v| v[0] <= v[1]),
                  "keys in schema must be sorted");

    let prefix = if let Some(path) = path {
        format!("{}.", path)
    } else {
        "".to_string()
    };

    let keys: HashSet<&str> = section
        .iter().map(|(key, _value)| *key)
        .collect();

    // The set of allowed keys are the known keys, plus
    // "ignore_invalid", and the value of "ignore_invalid".
    let mut allowed_keys: Vec<&str> = known_keys.to_vec();
    if let Some(ignore) = section.iter()
        .find_map(|(k, v)| (*k == "ignore_invalid").then_some(*v))
    {
        allowed_keys.push("ignore_invalid");
        match ignore {
            Item::Value(Value::String(k)) =>
                allowed_keys.push(k.value().as_str()),
            Item::Value(Value::Array(ks)) => {
                for k in ks {
                    if let Value::String(k) = k {
                        allowed_keys.push(k.value().as_str());
                    } else {
                        return Err(Error::ParseError(format!(
                            "'{}ignore_invalid' takes a string \
                             or an array of strings",
                            prefix)).into());
                    }
                }
            }
            _ => {
                return Err(Error::ParseError(format!(
                    "Invalid value for '{}ignore_invalid': {}, \
                     expected a string or an array of strings",
                    prefix, ignore)).into());
            }
        }
    }

    // Now check if there are any unknown keys.
    let mut unknown_keys = keys
        .difference(&allowed_keys.into_iter().collect())
        .copied()
        .collect::<Vec<_>>();
    unknown_keys.sort();
    if ! unknown_keys.is_empty() {
        return Err(Error::ParseError(format!(
            "{} has unknown keys: {}, valid keys are: {}",
            path.unwrap_or("top-level section"),
            unknown_keys.join(", "),
            // We don't include the keys listed in ignore_invalid.
            known_keys.join(", "))).into());
    }

    // Now validate the values.
    for (key, value) in &section {
        if let Ok(i) = schema.binary_search_by_key(key, |(k, _)| k) {
            let apply = schema[i].1;
            (apply)(config, &format!("{}{}", prefix, key), value)
                .with_context(|| format!("Error validating {:?}", key))?;
        }
    }

    Ok(())
}

/// Errors used in this module.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration item {0:?} is not a {1} but a {2}")]
    BadType(String, &'static str, &'static str),
}

impl Error {
    /// Returns an `Error::BadType` given an item.
    fn bad_item_type(path: &str, i: &Item, want_type: &'static str)
                     -> anyhow::Error
    {
        Error::BadType(path.into(), want_type, i.type_name()).into()
    }

    /// Returns an `Error::BadType` given a value.
    fn bad_value_type(path: &str, v: &Value, want_type: &'static str)
                      -> anyhow::Error
    {
        Error::BadType(path.into(), want_type, v.type_name()).into()
    }
}

/// A function that validates a node in the configuration tree with
/// the given path, and optionally makes changes to the configuration.
type Applicator = fn(&mut Option<&mut Config>, &str, &Item) -> Result<()>;

/// A [`Schema`] maps keys to [`Applicator`]s.
type Schema = &'static [(&'static str, Applicator)];

/// Schema for the toplevel.
const TOP_LEVEL_SCHEMA: Schema = &[
    ("backend", apply_backend),
    ("commands", apply_commands),
    ("crypt-hooks", apply_crypt_hooks),
    ("keys", apply_keys),
    ("passphrase", apply_passphrase),
    ("verify", apply_verify),
];

/// Returns the item as a table-like section.
fn section<'i>(path: &str, item: &'i Item)
               -> Result<&'i dyn toml_edit::TableLike>
{
    item.as_table_like()
        .ok_or_else(|| Error::bad_item_type(path, item, "table"))
}

fn get_bool(path: &str, item: &Item) -> Result<bool> {
    item.as_bool()
        .ok_or_else(|| Error::bad_item_type(path, item, "bool"))
}

fn get_str<'i>(path: &str, item: &'i Item) -> Result<&'i str> {
    item.as_str()
        .ok_or_else(|| Error::bad_item_type(path, item, "string"))
}

/// Schema for the `passphrase` section.
const PASSPHRASE_SCHEMA: Schema = &[
    ("timeout", apply_passphrase_timeout),
    ("use-agent", apply_passphrase_use_agent),
];

/// Validates the `passphrase` section.
fn apply_passphrase(config: &mut Option<&mut Config>, path: &str, item: &Item)
                    -> Result<()>
{
    apply_schema(config, Some(path), section(path, item)?.iter(),
                 PASSPHRASE_SCHEMA)
}

/// Validates the `passphrase.timeout` value.
fn apply_passphrase_timeout(config: &mut Option<&mut Config>,
                            path: &str, item: &Item)
                            -> Result<()>
{
    let s = get_str(path, item)?;
    let timeout = humantime::parse_duration(s)
        .with_context(|| format!("Invalid duration {:?}", s))?;

    if let Some(config) = config {
        config.passphrase_timeout = timeout;
    }

    Ok(())
}

/// Validates the `passphrase.use-agent` value.
fn apply_passphrase_use_agent(config: &mut Option<&mut Config>,
                              path: &str, item: &Item)
                              -> Result<()>
{
    let v = get_bool(path, item)?;
    if let Some(config) = config {
        config.use_agent = v;
    }
    Ok(())
}

/// Schema for the `verify` section.
const VERIFY_SCHEMA: Schema = &[
    ("good-signature", apply_verify_good_signature),
];

/// Validates the `verify` section.
fn apply_verify(config: &mut Option<&mut Config>, path: &str, item: &Item)
                -> Result<()>
{
    apply_schema(config, Some(path), section(path, item)?.iter(),
                 VERIFY_SCHEMA)
}

/// Validates the `verify.good-signature` value.
fn apply_verify_good_signature(config: &mut Option<&mut Config>,
                               path: &str, item: &Item)
                               -> Result<()>
{
    let s = get_str(path, item)?;
    let re = if s.is_empty() {
        None
    } else {
        Some(Regex::new(s)?)
    };

    if let Some(config) = config {
        config.good_signature = re;
    }

    Ok(())
}

/// Schema for the `backend` section.
const BACKEND_SCHEMA: Schema = &[
    ("check-exit", apply_backend_check_exit),
    ("keyring", apply_backend_keyring),
];

/// Validates the `backend` section.
fn apply_backend(config: &mut Option<&mut Config>, path: &str, item: &Item)
                 -> Result<()>
{
    apply_schema(config, Some(path), section(path, item)?.iter(),
                 BACKEND_SCHEMA)
}

/// Validates the `backend.check-exit` value.
fn apply_backend_check_exit(config: &mut Option<&mut Config>,
                            path: &str, item: &Item)
                            -> Result<()>
{
    let v = get_bool(path, item)?;
    if let Some(config) = config {
        config.check_exit = v;
    }
    Ok(())
}

/// Validates the `backend.keyring` value.
fn apply_backend_keyring(config: &mut Option<&mut Config>,
                         path: &str, item: &Item)
                         -> Result<()>
{
    let p = get_str(path, item)?;
    if let Some(config) = config {
        config.keyring = Some(p.into());
    }
    Ok(())
}

/// Schema for the `keys` section.
const KEYS_SCHEMA: Schema = &[
    ("auto-inline", apply_keys_flag),
    ("check-trust", apply_keys_flag),
    ("entry-format", apply_keys_string),
    ("hostname", apply_keys_string),
    ("ignore-subkeys", apply_keys_flag),
    ("long-ids", apply_keys_flag),
    ("show-unusable", apply_keys_flag),
    ("sign-as", apply_keys_string),
    ("sort", apply_keys_sort),
];

/// Validates the `keys` section.
fn apply_keys(config: &mut Option<&mut Config>, path: &str, item: &Item)
              -> Result<()>
{
    apply_schema(config, Some(path), section(path, item)?.iter(), KEYS_SCHEMA)
}

/// Returns the last component of a path.
fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Validates the boolean values of the `keys` section.
fn apply_keys_flag(config: &mut Option<&mut Config>, path: &str, item: &Item)
                   -> Result<()>
{
    let v = get_bool(path, item)?;
    if let Some(config) = config {
        match leaf(path) {
            "auto-inline" => config.auto_inline = v,
            "check-trust" => config.check_trust = v,
            "ignore-subkeys" => config.ignore_subkeys = v,
            "long-ids" => config.long_ids = v,
            "show-unusable" => config.show_unusable = v,
            k => return Err(Error::ParseError(format!(
                "{} is not a flag", k)).into()),
        }
    }
    Ok(())
}

/// Validates the string values of the `keys` section.
fn apply_keys_string(config: &mut Option<&mut Config>, path: &str, item: &Item)
                     -> Result<()>
{
    let v = get_str(path, item)?.to_string();
    if let Some(config) = config {
        match leaf(path) {
            "entry-format" => config.entry_format = v,
            "hostname" => config.hostname = Some(v).filter(|h| ! h.is_empty()),
            "sign-as" => config.sign_as = Some(v).filter(|k| ! k.is_empty()),
            k => return Err(Error::ParseError(format!(
                "{} is not a string", k)).into()),
        }
    }
    Ok(())
}

/// Validates the `keys.sort` value.
fn apply_keys_sort(config: &mut Option<&mut Config>, path: &str, item: &Item)
                   -> Result<()>
{
    let order: SortOrder = get_str(path, item)?.parse()?;
    if let Some(config) = config {
        config.sort = order;
    }
    Ok(())
}

/// Schema for the `commands` section.
const COMMANDS_SCHEMA: Schema = &[
    ("clearsign", apply_command),
    ("decode", apply_command),
    ("decrypt", apply_command),
    ("encrypt-only", apply_command),
    ("encrypt-sign", apply_command),
    ("export", apply_command),
    ("get-keys", apply_command),
    ("import", apply_command),
    ("list-pubring", apply_command),
    ("list-secring", apply_command),
    ("sign", apply_command),
    ("verify", apply_command),
    ("verify-key", apply_command),
];

/// Validates the `commands` section.
fn apply_commands(config: &mut Option<&mut Config>, path: &str, item: &Item)
                  -> Result<()>
{
    apply_schema(config, Some(path), section(path, item)?.iter(),
                 COMMANDS_SCHEMA)
}

/// Validates a command template.
fn apply_command(config: &mut Option<&mut Config>, path: &str, item: &Item)
                 -> Result<()>
{
    let op: Operation = leaf(path).parse()?;
    let list = item.as_array()
        .ok_or_else(|| Error::bad_item_type(path, item, "array"))?;

    let mut argv = Vec::new();
    for (i, element) in list.iter().enumerate() {
        let s = element.as_str()
            .ok_or_else(|| Error::bad_value_type(&format!("{}.{}", path, i),
                                                 element, "string"))?;
        argv.push(s);
    }
    let template = CommandTemplate::new(argv)?;

    if let Some(config) = config {
        config.templates.set(op, template);
    }

    Ok(())
}

/// Validates the `crypt-hooks` section.
///
/// The keys are regular expressions, so there is no schema.
fn apply_crypt_hooks(config: &mut Option<&mut Config>, path: &str, item: &Item)
                     -> Result<()>
{
    for (pattern, keyid) in section(path, item)?.iter() {
        let hook_path = format!("{}.{:?}", path, pattern);
        let re = Regex::new(pattern)
            .with_context(|| format!("Invalid pattern in {}", hook_path))?;
        let keyid = get_str(&hook_path, keyid)?;

        if let Some(config) = config.as_mut() {
            config.crypt_hooks.push((re, keyid.into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(toml: &str) -> Result<Config> {
        let file = ConfigFile {
            doc: toml.parse()?,
        };
        file.config()
    }

    #[test]
    fn template_is_valid() {
        let template = ConfigFile::default_template(
            Some(Path::new("/tmp/config.toml"))).unwrap();
        template.verify().unwrap();

        let mut dump = Vec::new();
        template.dump(&mut dump).unwrap();
        let dump = String::from_utf8(dump).unwrap();
        assert!(dump.contains("# /tmp/config.toml"));
        assert!(dump.contains("#list-pubring = [\"gpg\""));
    }

    #[test]
    fn enabled_template_yields_defaults() {
        let template = ConfigFile::config_template(None).unwrap();
        let r = Regex::new(r"(?m)^#([^ ])").unwrap();
        let defaults = r.replace_all(&template, "$1");
        let config = parse(&defaults).unwrap();

        let default = Config::default();
        assert_eq!(config.passphrase_timeout, default.passphrase_timeout);
        assert_eq!(config.good_signature.unwrap().as_str(),
                   DEFAULT_GOOD_SIGNATURE);
        assert_eq!(config.sort, default.sort);
        assert_eq!(config.entry_format, default.entry_format);
        assert!(config.crypt_hooks.is_empty());
        for op in Operation::ALL {
            assert_eq!(config.templates.get(*op).elements(),
                       op.default_template().elements());
        }
    }

    #[test]
    fn values() {
        let config = parse(r#"
[passphrase]
timeout = "1h 30m"
use-agent = true

[verify]
good-signature = ""

[backend]
check-exit = false
keyring = "/keys/pubring.gpg"

[keys]
sort = "reverse-date"
long-ids = true
ignore-subkeys = false
sign-as = "0xDEADBEEF"
hostname = "example.org"

[commands]
get-keys = ["fetch-keys", "%r"]
verify-key = []

[crypt-hooks]
"^bob@" = "0x12345678"
"@example\\.org$" = "carol@example.org"
"#).unwrap();

        assert_eq!(config.passphrase_timeout, Duration::from_secs(5400));
        assert!(config.use_agent);
        assert!(config.good_signature.is_none());
        assert!(! config.check_exit);
        assert_eq!(config.keyring.as_deref(), Some(Path::new("/keys/pubring.gpg")));
        assert_eq!(config.sort.to_string(), "reverse-date");
        assert!(config.long_ids);
        assert!(! config.ignore_subkeys);
        assert_eq!(config.sign_as.as_deref(), Some("0xDEADBEEF"));
        assert_eq!(config.hostname.as_deref(), Some("example.org"));
        assert_eq!(config.templates.get(Operation::GetKeys).elements(),
                   &["fetch-keys", "%r"]);
        assert!(config.templates.get(Operation::VerifyKey).is_disabled());

        assert_eq!(config.crypt_hook("bob@example.org"), Some("0x12345678"));
        assert_eq!(config.crypt_hook("dave@example.org"),
                   Some("carol@example.org"));
        assert_eq!(config.crypt_hook("dave@example.net"), None);
    }

    #[test]
    fn errors() {
        let e = parse("[keys]\ncolor = true\n").unwrap_err();
        assert!(format!("{:#}", e).contains("unknown keys: color"), "{:#}", e);

        parse("[keys]\nignore_invalid = \"color\"\ncolor = true\n").unwrap();

        let e = parse("[keys]\nlong-ids = \"yes\"\n").unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(),
                   Some(&Error::BadType("keys.long-ids".into(), "bool",
                                        "string")));

        assert!(parse("[keys]\nsort = \"random\"\n").is_err());
        assert!(parse("[passphrase]\ntimeout = \"soon\"\n").is_err());
        assert!(parse("[verify]\ngood-signature = \"(\"\n").is_err());
        assert!(parse("[commands]\nsign = [\"gpg\", 1]\n").is_err());
        assert!(parse("[commands]\nsign = [\"gpg\", \"%x\"]\n").is_err());
        assert!(parse("[commands]\nshred = [\"shred\"]\n").is_err());
        assert!(parse("[crypt-hooks]\n\"[\" = \"0x1\"\n").is_err());
    }
}
