//! Keys known to the backend.
//!
//! The backend lists keys in its colon format.  We parse the listing
//! into a [`KeyForest`], an arena holding principal keys followed by
//! their subkeys.  Subkeys refer to their principal key by index.

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Range};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use sequoia_openpgp as openpgp;
use openpgp::KeyID;

use crate::process::ProcessInvoker;
use crate::template::{Operation, TemplateParams};

const TRACE: bool = false;

/// Properties of a key, or of a user ID.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyFlags(u32);

impl KeyFlags {
    pub const EMPTY: KeyFlags = KeyFlags(0);
    pub const CAN_SIGN: KeyFlags = KeyFlags(1 << 0);
    pub const CAN_ENCRYPT: KeyFlags = KeyFlags(1 << 1);
    pub const SECRET: KeyFlags = KeyFlags(1 << 7);
    pub const EXPIRED: KeyFlags = KeyFlags(1 << 8);
    pub const REVOKED: KeyFlags = KeyFlags(1 << 9);
    pub const DISABLED: KeyFlags = KeyFlags(1 << 10);
    pub const SUBKEY: KeyFlags = KeyFlags(1 << 11);
    pub const CRITICAL: KeyFlags = KeyFlags(1 << 12);
    pub const PREFER_ENCRYPTION: KeyFlags = KeyFlags(1 << 13);
    pub const PREFER_SIGNING: KeyFlags = KeyFlags(1 << 14);

    /// Flags that a subkey inherits from its principal key.
    pub const RESTRICTIONS: KeyFlags = KeyFlags(
        Self::EXPIRED.0 | Self::REVOKED.0 | Self::DISABLED.0
            | Self::CRITICAL.0 | Self::PREFER_ENCRYPTION.0
            | Self::PREFER_SIGNING.0);

    /// Flags that make a key unusable.
    pub const CANTUSE: KeyFlags = KeyFlags(
        Self::DISABLED.0 | Self::REVOKED.0 | Self::EXPIRED.0);

    pub const ABILITIES: KeyFlags = KeyFlags(
        Self::CAN_ENCRYPT.0 | Self::CAN_SIGN.0);

    const NAMES: &'static [(KeyFlags, &'static str)] = &[
        (Self::CAN_SIGN, "can-sign"),
        (Self::CAN_ENCRYPT, "can-encrypt"),
        (Self::SECRET, "secret"),
        (Self::EXPIRED, "expired"),
        (Self::REVOKED, "revoked"),
        (Self::DISABLED, "disabled"),
        (Self::SUBKEY, "subkey"),
        (Self::CRITICAL, "critical"),
        (Self::PREFER_ENCRYPTION, "prefer-encryption"),
        (Self::PREFER_SIGNING, "prefer-signing"),
    ];

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns whether all flags in `other` are set.
    pub fn contains(&self, other: KeyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any flag in `other` is set.
    pub fn intersects(&self, other: KeyFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: KeyFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: KeyFlags) {
        self.0 &= ! other.0;
    }
}

impl BitOr for KeyFlags {
    type Output = KeyFlags;
    fn bitor(self, other: KeyFlags) -> KeyFlags {
        KeyFlags(self.0 | other.0)
    }
}

impl BitOrAssign for KeyFlags {
    fn bitor_assign(&mut self, other: KeyFlags) {
        self.0 |= other.0;
    }
}

impl BitAnd for KeyFlags {
    type Output = KeyFlags;
    fn bitand(self, other: KeyFlags) -> KeyFlags {
        KeyFlags(self.0 & other.0)
    }
}

impl fmt::Debug for KeyFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = Self::NAMES.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(f, "KeyFlags({})", names.join(" | "))
    }
}

/// The validity of the binding between a user ID and a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trust {
    #[default]
    Undefined,
    None,
    Marginal,
    Full,
}

impl Trust {
    /// Returns the trust level, 0 to 3.
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Returns the character shown in key menus.
    pub fn as_char(&self) -> char {
        match self {
            Trust::Undefined => '?',
            Trust::None => '-',
            Trust::Marginal => ' ',
            Trust::Full => '+',
        }
    }

    /// Maps the validity field of the colon format.
    fn from_validity(c: Option<char>) -> Self {
        match c {
            Some('n') => Trust::None,
            Some('m') => Trust::Marginal,
            Some('f') | Some('u') => Trust::Full,
            _ => Trust::Undefined,
        }
    }
}

/// A user ID bound to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// The user ID as listed, usually `Name <mailbox>`.
    pub address: String,
    pub trust: Trust,
    /// Revoked, expired, and disabled.
    pub flags: KeyFlags,
}

impl UserIdentity {
    pub fn new<S: Into<String>>(address: S, trust: Trust) -> Self {
        UserIdentity {
            address: address.into(),
            trust,
            flags: KeyFlags::EMPTY,
        }
    }

    /// Returns the mailbox part, i.e. the part in angle brackets if
    /// any.
    pub fn mailbox(&self) -> &str {
        match (self.address.rfind('<'), self.address.rfind('>')) {
            (Some(start), Some(end)) if start < end =>
                self.address[start + 1..end].trim(),
            _ => self.address.trim(),
        }
    }

    /// Returns the display name, if any.
    pub fn name(&self) -> Option<&str> {
        let start = self.address.rfind('<')?;
        let name = self.address[..start].trim().trim_matches('"').trim();
        (! name.is_empty()).then_some(name)
    }
}

/// The index of a key in a [`KeyForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyIndex(usize);

impl KeyIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A key, or subkey.
#[derive(Debug, Clone)]
pub struct Key {
    pub keyid: KeyID,
    pub algorithm: &'static str,
    pub length: u32,
    pub created: DateTime<Utc>,
    pub flags: KeyFlags,
    /// Subkeys carry copies of their principal's user IDs.
    pub uids: Vec<UserIdentity>,
    /// For subkeys, the principal key.  `None` for principal keys.
    principal: Option<KeyIndex>,
}

impl Key {
    pub fn new(keyid: KeyID, algorithm: &'static str, length: u32,
               created: DateTime<Utc>, flags: KeyFlags)
               -> Self
    {
        Key {
            keyid,
            algorithm,
            length,
            created,
            flags,
            uids: Vec::new(),
            principal: None,
        }
    }

    /// Returns the key ID, as 16 hex digits.
    pub fn long_id(&self) -> String {
        self.keyid.to_hex()
    }

    /// Returns the key ID, as shown to the user.
    ///
    /// That is the last 8 hex digits, unless `long` is set.
    pub fn display_id(&self, long: bool) -> String {
        let id = self.long_id();
        if long || id.len() <= 8 {
            id
        } else {
            id[id.len() - 8..].to_string()
        }
    }

    pub fn is_subkey(&self) -> bool {
        self.principal.is_some()
    }

    /// Returns the index of the principal key, for subkeys.
    pub fn principal(&self) -> Option<KeyIndex> {
        self.principal
    }
}

/// An arena of keys.
///
/// Each principal key is immediately followed by its subkeys.  A
/// principal key together with its subkeys is called a group.
#[derive(Debug, Clone, Default)]
pub struct KeyForest {
    keys: Vec<Key>,
}

impl KeyForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key at `index`.
    ///
    /// # Panics
    ///
    /// Indices are only valid for the forest that handed them out.
    pub fn get(&self, index: KeyIndex) -> &Key {
        &self.keys[index.0]
    }

    /// Iterates over all keys.
    pub fn iter(&self) -> impl Iterator<Item = (KeyIndex, &Key)> {
        self.keys.iter().enumerate().map(|(i, k)| (KeyIndex(i), k))
    }

    /// Adds a principal key.
    pub fn push_principal(&mut self, mut key: Key) -> KeyIndex {
        key.principal = None;
        key.flags.remove(KeyFlags::SUBKEY);
        self.keys.push(key);
        KeyIndex(self.keys.len() - 1)
    }

    /// Adds a subkey to the last group.
    ///
    /// Returns `None` if there is no principal key yet.
    pub fn push_subkey(&mut self, mut key: Key) -> Option<KeyIndex> {
        let principal = self.keys.iter().rposition(|k| ! k.is_subkey())?;
        key.principal = Some(KeyIndex(principal));
        key.flags.insert(KeyFlags::SUBKEY);
        self.keys.push(key);
        Some(KeyIndex(self.keys.len() - 1))
    }

    /// Returns the principal key of `index`.
    pub fn principal_index(&self, index: KeyIndex) -> KeyIndex {
        self.get(index).principal.unwrap_or(index)
    }

    /// Returns the principal key of `index`.
    pub fn principal(&self, index: KeyIndex) -> &Key {
        self.get(self.principal_index(index))
    }

    /// Returns the flags of `index`, including the restrictions
    /// inherited from the principal key.
    pub fn effective_flags(&self, index: KeyIndex) -> KeyFlags {
        self.get(index).flags
            | (self.principal(index).flags & KeyFlags::RESTRICTIONS)
    }

    /// Returns whether the key at `index` can't be used.
    pub fn is_unusable(&self, index: KeyIndex) -> bool {
        (self.get(index).flags | self.principal(index).flags)
            .intersects(KeyFlags::CANTUSE)
    }

    /// Returns the ranges of the groups.
    fn group_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = Vec::new();
        for (i, key) in self.keys.iter().enumerate() {
            match ranges.last_mut() {
                Some(r) if key.is_subkey() => r.end = i + 1,
                _ => ranges.push(i..i + 1),
            }
        }
        ranges
    }

    /// Returns the principal keys.
    pub fn principals(&self) -> impl Iterator<Item = KeyIndex> + '_ {
        self.iter().filter(|(_, k)| ! k.is_subkey()).map(|(i, _)| i)
    }

    /// Returns the keys in the group of `index`.
    pub fn group(&self, index: KeyIndex) -> impl Iterator<Item = KeyIndex> + '_ {
        let principal = self.principal_index(index);
        self.iter()
            .skip(principal.0)
            .take_while(move |(i, k)| *i == principal || k.is_subkey())
            .map(|(i, _)| i)
    }

    /// Returns a forest holding the groups whose principal key
    /// satisfies `keep`.
    ///
    /// The keys are moved, and reindexed.
    pub fn retain_groups<F>(self, mut keep: F) -> KeyForest
    where
        F: FnMut(KeyIndex) -> bool,
    {
        let ranges = self.group_ranges();
        let mut keys: Vec<Option<Key>> =
            self.keys.into_iter().map(Some).collect();

        let mut result = KeyForest::new();
        for range in ranges {
            if ! keep(KeyIndex(range.start)) {
                continue;
            }
            for key in keys[range].iter_mut().filter_map(Option::take) {
                if key.is_subkey() {
                    result.push_subkey(key);
                } else {
                    result.push_principal(key);
                }
            }
        }
        result
    }

    /// Moves the groups of `other` into this forest.
    ///
    /// Groups whose principal key is already present are skipped.
    pub fn merge(&mut self, other: KeyForest) {
        tracer!(TRACE, "KeyForest::merge");

        let mut seen: HashSet<KeyID> = self.principals()
            .map(|i| self.get(i).keyid.clone())
            .collect();

        let mut skipping = false;
        for key in other.keys {
            if key.is_subkey() {
                if ! skipping {
                    self.push_subkey(key);
                }
            } else if seen.contains(&key.keyid) {
                t!("Skipping duplicate {}", key.keyid);
                skipping = true;
            } else {
                skipping = false;
                seen.insert(key.keyid.clone());
                self.push_principal(key);
            }
        }
    }
}

/// Which keys to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyring {
    Public,
    Secret,
}

impl Keyring {
    fn operation(&self) -> Operation {
        match self {
            Keyring::Public => Operation::ListPubring,
            Keyring::Secret => Operation::ListSecring,
        }
    }
}

/// Returns the name of an OpenPGP public key algorithm.
fn algorithm_name(algo: u8) -> &'static str {
    match algo {
        1 | 2 | 3 => "RSA",
        16 | 20 => "ElG",
        17 => "DSA",
        18 => "ECDH",
        19 => "ECDSA",
        22 => "EdDSA",
        _ => "unk",
    }
}

/// Returns what an algorithm can do, for listings that don't say.
fn algorithm_abilities(algo: u8) -> KeyFlags {
    match algo {
        1 | 20 => KeyFlags::ABILITIES,
        2 | 16 | 18 => KeyFlags::CAN_ENCRYPT,
        3 | 17 | 19 | 22 => KeyFlags::CAN_SIGN,
        _ => KeyFlags::EMPTY,
    }
}

/// Replaces `\xHH` escapes.
fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            if let Some(b) = s.get(i + 2..i + 4)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses a creation date.
///
/// The backend prints either seconds since the epoch, or a date.
fn parse_created(field: &str) -> DateTime<Utc> {
    let created = if let Ok(secs) = field.parse::<i64>() {
        DateTime::from_timestamp(secs, 0)
    } else {
        NaiveDate::parse_from_str(field, "%Y-%m-%d").ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    };
    created.unwrap_or_default()
}

/// Parses a key listing in colon format.
///
/// Unknown records and malformed keys are skipped.
pub fn parse_listing(listing: &[u8]) -> Result<KeyForest> {
    tracer!(TRACE, "parse_listing");

    let mut forest = KeyForest::new();
    let mut principal_uids: Vec<UserIdentity> = Vec::new();
    // The key that uid records attach to.
    let mut current: Option<KeyIndex> = None;

    for line in String::from_utf8_lossy(listing).lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |i: usize| fields.get(i - 1).copied().unwrap_or("");

        let record = field(1);
        let (secret, subkey) = match record {
            "pub" => (false, false),
            "sec" => (true, false),
            "sub" => (false, true),
            "ssb" => (true, true),
            "uid" => {
                let Some(key) = current else {
                    t!("uid record without a key: {:?}", line);
                    continue;
                };
                let validity = field(2).chars().next();
                let mut uid = UserIdentity::new(unescape(field(10)),
                                                Trust::from_validity(validity));
                match validity {
                    Some('r') => uid.flags.insert(KeyFlags::REVOKED),
                    Some('e') => uid.flags.insert(KeyFlags::EXPIRED),
                    Some('d') => uid.flags.insert(KeyFlags::DISABLED),
                    _ => (),
                }
                principal_uids.push(uid.clone());
                forest.keys[key.0].uids.push(uid);
                continue;
            }
            _ => continue,
        };

        let keyid = match KeyID::from_hex(field(5)) {
            Ok(k) => k,
            Err(e) => {
                t!("Skipping key with bad key ID {:?}: {}", field(5), e);
                current = None;
                continue;
            }
        };
        let algo = field(4).parse::<u8>().unwrap_or(0);

        let mut flags = KeyFlags::EMPTY;
        match field(2).chars().next() {
            Some('e') => flags.insert(KeyFlags::EXPIRED),
            Some('r') => flags.insert(KeyFlags::REVOKED),
            Some('d') => flags.insert(KeyFlags::DISABLED),
            _ => (),
        }
        if secret {
            flags.insert(KeyFlags::SECRET);
        }

        let capabilities = field(12);
        if capabilities.is_empty() {
            flags.insert(algorithm_abilities(algo));
        } else {
            for c in capabilities.chars() {
                match c {
                    'e' => flags.insert(KeyFlags::CAN_ENCRYPT),
                    's' => flags.insert(KeyFlags::CAN_SIGN),
                    'D' => flags.insert(KeyFlags::DISABLED),
                    _ => (),
                }
            }
        }

        let key = Key::new(keyid, algorithm_name(algo),
                           field(3).parse().unwrap_or(0),
                           parse_created(field(6)), flags);

        if subkey {
            let mut key = key;
            key.uids = principal_uids.clone();
            if forest.push_subkey(key).is_none() {
                t!("Subkey without a principal key: {:?}", line);
            }
            // Only principal keys collect uids.
            current = None;
        } else {
            principal_uids.clear();
            let index = forest.push_principal(key);
            current = Some(index);

            // Old listings put the primary user ID on the key record.
            let uid = field(10);
            if ! uid.is_empty() {
                let uid = UserIdentity::new(
                    unescape(uid), Trust::from_validity(field(2).chars().next()));
                principal_uids.push(uid.clone());
                forest.keys[index.0].uids.push(uid);
            }
        }
    }

    Ok(forest)
}

/// The characters hints are split on.
const HINT_SEPARATORS: &[char] = &[' ', ',', '.', ':', '"', '(', ')', '<', '>', '\n'];

/// Adds the search hints derived from `s` to `hints`.
///
/// Short tokens match too many keys, so only tokens longer than three
/// bytes are kept.
pub fn add_hints(hints: &mut Vec<String>, s: &str) {
    for token in s.split(HINT_SEPARATORS) {
        if token.len() > 3 && ! hints.iter().any(|h| h == token) {
            hints.push(token.to_string());
        }
    }
}

/// Where keys come from.
pub trait KeySource {
    /// Returns the keys matching any of the hints.
    ///
    /// With no hints, all keys are returned.
    fn query(&self, hints: &[String], ring: Keyring) -> Result<KeyForest>;

    /// Tries to fetch keys for `mailbox`, e.g. from the network.
    fn fetch(&self, mailbox: &str) -> Result<()>;

    /// Returns a human-readable description of the key, including
    /// its fingerprint and certifications.
    fn describe(&self, keyid: &str) -> Result<String>;
}

/// The number of hints passed to one backend invocation.
const HINTS_PER_QUERY: usize = 16;

/// Keys listed by the backend.
pub struct BackendKeySource {
    invoker: ProcessInvoker,
}

impl BackendKeySource {
    pub fn new(invoker: ProcessInvoker) -> Self {
        BackendKeySource { invoker }
    }

    fn list(&self, hints: &[String], ring: Keyring) -> Result<KeyForest> {
        tracer!(TRACE, "BackendKeySource::list");
        let captured = self.invoker.capture(ring.operation(), &TemplateParams {
            recipients: hints,
            ..Default::default()
        })?;
        if ! captured.status.success() {
            // Some hints not matching anything is not an error.
            t!("Listing exited with {}", captured.status);
        }
        parse_listing(&captured.stdout)
    }
}

impl KeySource for BackendKeySource {
    fn query(&self, hints: &[String], ring: Keyring) -> Result<KeyForest> {
        let mut forest = KeyForest::new();
        if hints.is_empty() {
            return self.list(&[], ring);
        }
        for batch in hints.chunks(HINTS_PER_QUERY) {
            forest.merge(self.list(batch, ring)?);
        }
        Ok(forest)
    }

    fn fetch(&self, mailbox: &str) -> Result<()> {
        if ! self.invoker.is_enabled(Operation::GetKeys) {
            return Ok(());
        }
        self.invoker.capture(Operation::GetKeys, &TemplateParams {
            recipients: &[mailbox.to_string()],
            ..Default::default()
        })?;
        Ok(())
    }

    fn describe(&self, keyid: &str) -> Result<String> {
        let captured = self.invoker.capture(Operation::VerifyKey, &TemplateParams {
            recipients: &[keyid.to_string()],
            ..Default::default()
        })?;
        Ok(String::from_utf8_lossy(&captured.stdout).into_owned())
    }
}
