//! Finds the keys to encrypt to.

use std::fmt;

use anyhow::Result;

use crate::address::Address;
use crate::error::Error;
use crate::keys::{self, KeyFlags, Keyring};
use crate::pgp::Pgp;
use crate::select::{KeyQuery, SelectedKey};
use crate::ui::Answer;

const TRACE: bool = false;

/// The keys to encrypt to, as handed to the backend.
///
/// Every entry is a key ID prefixed with `0x`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList(Vec<String>);

impl KeyList {
    pub fn new() -> Self {
        KeyList::default()
    }

    /// Adds a key ID.
    ///
    /// A `0x` prefix is added if missing.
    pub fn push(&mut self, keyid: &str) {
        let keyid = keyid.strip_prefix("0x")
            .or_else(|| keyid.strip_prefix("0X"))
            .unwrap_or(keyid);
        self.0.push(format!("0x{}", keyid));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key IDs.
    pub fn recipients(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for KeyList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl std::str::FromStr for KeyList {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut list = KeyList::new();
        for keyid in s.split_whitespace() {
            list.push(keyid);
        }
        Ok(list)
    }
}

/// Returns whether `s` is a key ID, as opposed to something that
/// needs to be looked up.
pub fn is_numeric_keyid(s: &str) -> bool {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    ! s.is_empty() && s.len() % 8 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Looks up the keys for an address, and lets the user pick one.
///
/// A key matches if one of its user IDs has the address' mailbox,
/// or the address' display name.
pub fn key_by_address(pgp: &Pgp, address: &Address, abilities: KeyFlags,
                      ring: Keyring)
                      -> Result<SelectedKey>
{
    tracer!(TRACE, "key_by_address");

    let mut hints = Vec::new();
    keys::add_hints(&mut hints, &address.mailbox);
    if let Some(name) = &address.name {
        keys::add_hints(&mut hints, name);
    }
    t!("{}: hints {:?}", address, hints);

    let forest = pgp.keys().query(&hints, ring)?;
    let keep: Vec<_> = forest.principals()
        .filter(|&p| forest.group(p).any(|k| {
            let key = forest.get(k);
            (abilities.is_empty() || key.flags.intersects(abilities))
                && key.uids.iter().any(|uid| {
                    uid.mailbox().eq_ignore_ascii_case(&address.mailbox)
                        || matches!((uid.name(), &address.name),
                                    (Some(a), Some(b))
                                    if a.eq_ignore_ascii_case(b))
                })
        }))
        .collect();
    t!("{} of {} keys match", keep.len(), forest.principals().count());
    let forest = forest.retain_groups(|p| keep.contains(&p));

    pgp.selector().select(forest, abilities, KeyQuery::Address(&address.mailbox))
}

/// Looks up the keys matching a string, and lets the user pick one.
///
/// A key matches if the string is empty, is the key's ID, short or
/// long, with or without `0x`, or is contained in one of its user
/// IDs.
pub fn key_by_string(pgp: &Pgp, s: &str, abilities: KeyFlags, ring: Keyring)
                     -> Result<SelectedKey>
{
    tracer!(TRACE, "key_by_string");

    let mut hints = Vec::new();
    keys::add_hints(&mut hints, s);

    let forest = pgp.keys().query(&hints, ring)?;
    let needle = s.to_lowercase();
    let id = needle.strip_prefix("0x").unwrap_or(&needle);
    let keep: Vec<_> = forest.principals()
        .filter(|&p| forest.group(p).any(|k| {
            let key = forest.get(k);
            needle.is_empty()
                || key.display_id(false).eq_ignore_ascii_case(id)
                || key.long_id().eq_ignore_ascii_case(id)
                || key.uids.iter().any(
                    |uid| uid.address.to_lowercase().contains(&needle))
        }))
        .collect();
    t!("{:?}: {} keys match", s, keep.len());
    let forest = forest.retain_groups(|p| keep.contains(&p));

    pgp.selector().select(forest, abilities, KeyQuery::String(s))
}

/// Asks the user for a key.
///
/// Keeps asking until the answer matches a key.  If `whatfor` is
/// given, the answer is remembered and offered as the default the
/// next time.  Returns [`Error::Cancelled`] if the user doesn't
/// answer.
pub fn ask_for_key(pgp: &Pgp, prompt: &str, whatfor: Option<&str>,
                   abilities: KeyFlags, ring: Keyring)
                   -> Result<SelectedKey>
{
    tracer!(TRACE, "ask_for_key");

    let default = whatfor.and_then(|w| pgp.id_default(w));
    loop {
        let answer = pgp.ui().prompt_text(prompt, default.as_deref(), false)?;
        let answer = match answer {
            Some(a) if ! a.trim().is_empty() => a.trim().to_string(),
            _ => return Err(Error::Cancelled.into()),
        };

        if let Some(w) = whatfor {
            pgp.set_id_default(w, &answer);
        }

        match key_by_string(pgp, &answer, abilities, ring) {
            Ok(key) => return Ok(key),
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::KeyNotFound(_)) | Some(Error::SelectionCancelled) => {
                    t!("{:?}: {}", answer, e);
                    pgp.ui().notify(&e.to_string());
                }
                _ => return Err(e),
            },
        }
    }
}

/// Returns the keys for all recipients.
///
/// Every recipient must be resolved.  If one can't be, the whole
/// resolution fails, and no key list is returned.
pub fn find_keys(pgp: &Pgp, to: &[Address], cc: &[Address], bcc: &[Address])
                 -> Result<KeyList>
{
    tracer!(TRACE, "find_keys");

    let config = pgp.config();
    let mut recipients: Vec<Address> = Vec::new();
    for address in to.iter().chain(cc).chain(bcc) {
        let mut address = address.clone();
        if let Some(hostname) = &config.hostname {
            address.qualify(hostname);
        }
        if ! recipients.iter().any(|r| r.same_mailbox(&address)) {
            recipients.push(address);
        }
    }

    let mut keylist = KeyList::new();
    for address in recipients {
        let mailbox = address.mailbox.clone();
        let mut target = address;
        let mut key = None;

        if let Some(hook) = config.crypt_hook(&mailbox) {
            let question = format!("Use keyID = \"{}\" for {}?", hook, mailbox);
            match pgp.ui().prompt_yes_no(&question, Answer::Yes)? {
                Answer::Abort => return Err(Error::SelectionCancelled.into()),
                Answer::No => (),
                Answer::Yes if is_numeric_keyid(hook) => {
                    t!("{}: using {} as is", mailbox, hook);
                    keylist.push(hook);
                    continue;
                }
                Answer::Yes => match Address::parse(hook) {
                    Some(mut a) if hook.contains('@') => {
                        if let Some(hostname) = &config.hostname {
                            a.qualify(hostname);
                        }
                        target = a;
                    }
                    _ => key = not_found_is_none(key_by_string(
                        pgp, hook, KeyFlags::CAN_ENCRYPT, Keyring::Public))?,
                },
            }
        }

        let key = match key {
            Some(key) => key,
            None => {
                if let Err(e) = pgp.keys().fetch(&target.mailbox) {
                    t!("Fetching keys for {} failed: {}", target.mailbox, e);
                }
                let found = not_found_is_none(key_by_address(
                    pgp, &target, KeyFlags::CAN_ENCRYPT, Keyring::Public))?;
                match found {
                    Some(key) => key,
                    None => ask_for_key(
                        pgp, &format!("Enter keyID for {}: ", mailbox),
                        Some(&mailbox), KeyFlags::CAN_ENCRYPT, Keyring::Public)
                        .map_err(|e| match e.downcast_ref::<Error>() {
                            Some(Error::Cancelled) =>
                                Error::KeyNotFound(mailbox.clone()).into(),
                            _ => e,
                        })?,
                }
            }
        };

        keylist.push(&key.keyid(config.long_ids, config.ignore_subkeys));
    }

    t!("{}", keylist);
    Ok(keylist)
}

/// Maps [`Error::KeyNotFound`] to `None`.
fn not_found_is_none(r: Result<SelectedKey>) -> Result<Option<SelectedKey>> {
    match r {
        Ok(key) => Ok(Some(key)),
        Err(e) if matches!(e.downcast_ref::<Error>(),
                           Some(Error::KeyNotFound(_))) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::config::Config;
    use crate::keys::test::{ALICE, BOB, StaticKeySource};
    use crate::pgp::test::context;
    use crate::ui::Selection;
    use crate::ui::scripted::{Reply, ScriptedUi};

    fn addresses(s: &str) -> Vec<Address> {
        Address::parse_list(s)
    }

    fn keyring() -> StaticKeySource {
        StaticKeySource::new(&format!("{}{}", ALICE, BOB))
    }

    #[test]
    fn keylist() {
        let mut list = KeyList::new();
        list.push("AAAA1111");
        list.push("0xBBBB2222");
        assert_eq!(list.to_string(), "0xAAAA1111 0xBBBB2222");
        assert_eq!("AAAA1111 0xBBBB2222".parse::<KeyList>().unwrap(), list);
        assert!(is_numeric_keyid("0x12345678"));
        assert!(is_numeric_keyid("1234567812345678"));
        assert!(! is_numeric_keyid("0x1234567"));
        assert!(! is_numeric_keyid("carol@example"));
        assert!(! is_numeric_keyid("0x"));
    }

    #[test]
    fn strong_match() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![]);
        let pgp = context(Config::default(), &keys, &ui);

        let list = find_keys(&pgp, &addresses("Alice <alice@example.org>"),
                             &[], &[]).unwrap();
        assert_eq!(list.to_string(), "0xAAAA1111");
        assert_eq!(*keys.fetched.borrow(), vec!["alice@example.org"]);
    }

    #[test]
    fn subkeys_and_long_ids() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![]);
        let mut config = Config::default();
        config.ignore_subkeys = false;
        config.long_ids = true;
        let pgp = context(config, &keys, &ui);

        let list = find_keys(&pgp, &addresses("alice@example.org"), &[], &[])
            .unwrap();
        assert_eq!(list.to_string(), "0xAAAA2222AAAA2222");
    }

    #[test]
    fn qualified_and_deduplicated() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![]);
        let mut config = Config::default();
        config.hostname = Some("example.org".into());
        let pgp = context(config, &keys, &ui);

        let list = find_keys(&pgp, &addresses("alice"),
                             &addresses("ALICE@example.org"), &[]).unwrap();
        assert_eq!(list.to_string(), "0xAAAA1111");
    }

    #[test]
    fn one_unresolved_recipient_fails_all() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![Reply::Text(None)]);
        let pgp = context(Config::default(), &keys, &ui);

        let err = find_keys(
            &pgp,
            &addresses("alice@example.org, bob@example.org"),
            &addresses("carol@example.org"), &[])
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(),
                   Some(&Error::KeyNotFound("bob@example.org".into())));
        assert!(ui.done());
        assert_eq!(ui.log.borrow().as_slice(),
                   &["Enter keyID for bob@example.org: "]);
        assert_eq!(*keys.fetched.borrow(),
                   vec!["alice@example.org", "bob@example.org"]);
    }

    #[test]
    fn cancelled_selection_fails_all() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![Reply::Select(Selection::Cancelled)]);
        // The work address is only marginally trusted, so the user
        // has to choose.
        let pgp = context(Config::default(), &keys, &ui);

        let err = find_keys(&pgp, &addresses("alice@work.example"), &[], &[])
            .unwrap_err();
        assert!(Error::is_cancellation(&err));
        assert!(ui.done());
    }

    #[test]
    fn key_entered_by_hand() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![
            Reply::Text(Some("AAAA1111".into())),
            Reply::Select(Selection::Chosen(0)),
            Reply::YesNo(Answer::Yes),
        ]);
        let pgp = context(Config::default(), &keys, &ui);

        let list = find_keys(&pgp, &addresses("dave@example.net"), &[], &[])
            .unwrap();
        assert_eq!(list.to_string(), "0xAAAA1111");
        assert!(ui.done());
        assert_eq!(ui.log.borrow().as_slice(), &[
            "Enter keyID for dave@example.net: ",
            "PGP keys matching \"AAAA1111\".",
            "This ID is only marginally trusted. Do you really want to use it?",
        ]);
        assert_eq!(pgp.id_default("dave@example.net").as_deref(),
                   Some("AAAA1111"));
    }

    #[test]
    fn crypt_hooks() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![
            Reply::YesNo(Answer::Yes),
            Reply::YesNo(Answer::Yes),
        ]);
        let mut config = Config::default();
        config.crypt_hooks = vec![
            (regex::Regex::new("^carol@").unwrap(), "0x12345678".into()),
            (regex::Regex::new("^dave@").unwrap(), "alice@example.org".into()),
        ];
        let pgp = context(config, &keys, &ui);

        let list = find_keys(&pgp, &addresses("carol@example.org"),
                             &addresses("dave@example.org"), &[]).unwrap();
        assert_eq!(list.to_string(), "0x12345678 0xAAAA1111");
        assert_eq!(ui.log.borrow()[0],
                   "Use keyID = \"0x12345678\" for carol@example.org?");
        // Numeric key IDs are not looked up.
        assert_eq!(*keys.fetched.borrow(), vec!["alice@example.org"]);
    }

    #[test]
    fn aborted_crypt_hook() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![Reply::YesNo(Answer::Abort)]);
        let mut config = Config::default();
        config.crypt_hooks =
            vec![(regex::Regex::new(".").unwrap(), "0x12345678".into())];
        let pgp = context(config, &keys, &ui);

        let err = find_keys(&pgp, &addresses("alice@example.org"), &[], &[])
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::SelectionCancelled));
    }

    #[test]
    fn by_string() {
        let keys = keyring();
        let ui = ScriptedUi::new(vec![Reply::Select(Selection::Chosen(1))]);
        let pgp = context(Config::default(), &keys, &ui);

        // Bob's key is revoked.
        let err = key_by_string(&pgp, "0xBBBB1111", KeyFlags::EMPTY,
                                Keyring::Public).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::KeyNotFound(_))));

        let key = key_by_string(&pgp, "Alice Example", KeyFlags::CAN_SIGN,
                                Keyring::Public).unwrap();
        assert_eq!(key.key().long_id(), "AAAA1111AAAA1111");
        assert_eq!(key.identity().address, "Alice Example <alice@example.org>");
        assert!(ui.done());
    }
}
