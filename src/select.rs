//! Ranks keys and lets the user pick one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::entry;
use crate::error::Error;
use crate::keys::{Key, KeyFlags, KeyForest, KeyIndex, KeySource, Trust,
                  UserIdentity};
use crate::ui::{Answer, Interaction, Selection};

const TRACE: bool = false;

/// The attribute keys are sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Address,
    KeyId,
    Date,
    #[default]
    Trust,
}

/// How candidates are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortOrder {
    pub key: SortKey,
    pub reverse: bool,
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (reverse, name) = match s.strip_prefix("reverse-") {
            Some(name) => (true, name),
            None => (false, s),
        };
        let key = match name {
            "address" => SortKey::Address,
            "keyid" => SortKey::KeyId,
            "date" => SortKey::Date,
            "trust" => SortKey::Trust,
            _ => return Err(anyhow::anyhow!(
                "Unknown sort order {:?}, expected one of address, keyid, \
                 date, or trust, optionally prefixed with reverse-", s)),
        };
        Ok(SortOrder { key, reverse })
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reverse {
            f.write_str("reverse-")?;
        }
        f.write_str(match self.key {
            SortKey::Address => "address",
            SortKey::KeyId => "keyid",
            SortKey::Date => "date",
            SortKey::Trust => "trust",
        })
    }
}

/// A user ID on a key, as shown in the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub key: KeyIndex,
    /// The index into the key's user IDs.
    pub uid: usize,
}

impl Candidate {
    pub fn identity<'f>(&self, forest: &'f KeyForest) -> &'f UserIdentity {
        &forest.get(self.key).uids[self.uid]
    }
}

/// Compares strings ignoring case.
fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars().flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

impl SortOrder {
    /// Compares two candidates.
    ///
    /// This is a total order.  Reversing it inverts every result.
    pub fn compare(&self, forest: &KeyForest, long_ids: bool,
                   a: &Candidate, b: &Candidate)
                   -> Ordering
    {
        let (ka, kb) = (forest.get(a.key), forest.get(b.key));
        let (ua, ub) = (a.identity(forest), b.identity(forest));
        let address = || cmp_ignore_case(&ua.address, &ub.address);
        let keyid = || cmp_ignore_case(&ka.display_id(long_ids),
                                       &kb.display_id(long_ids));

        let ordering = match self.key {
            SortKey::Address => address().then_with(keyid),
            SortKey::KeyId => keyid().then_with(address),
            SortKey::Date => ka.created.cmp(&kb.created).then_with(address),
            SortKey::Trust => {
                let restrictions = |c: &Candidate| {
                    (forest.effective_flags(c.key) & KeyFlags::RESTRICTIONS)
                        .bits()
                };
                restrictions(a).cmp(&restrictions(b))
                    .then_with(|| ua.trust.cmp(&ub.trust))
                    .then_with(|| ka.length.cmp(&kb.length))
                    .then_with(|| ka.created.cmp(&kb.created))
                    .then_with(address)
                    .then_with(keyid)
            }
        };

        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// What the user is looking for.
#[derive(Debug, Clone, Copy)]
pub enum KeyQuery<'q> {
    /// Keys for a mail address.
    Address(&'q str),
    /// Keys matching a string, e.g. a key ID.
    String(&'q str),
}

impl KeyQuery<'_> {
    fn title(&self) -> String {
        match self {
            KeyQuery::Address(a) => format!("PGP keys matching <{}>.", a),
            KeyQuery::String(s) => format!("PGP keys matching \"{}\".", s),
        }
    }

    fn what(&self) -> &str {
        match self {
            KeyQuery::Address(s) | KeyQuery::String(s) => s,
        }
    }
}

/// The key the user picked.
///
/// Owns the forest the key was selected from.
#[derive(Debug, Clone)]
pub struct SelectedKey {
    forest: KeyForest,
    index: KeyIndex,
    uid: usize,
}

impl SelectedKey {
    pub fn new(forest: KeyForest, index: KeyIndex, uid: usize) -> Self {
        SelectedKey { forest, index, uid }
    }

    pub fn key(&self) -> &Key {
        self.forest.get(self.index)
    }

    pub fn principal(&self) -> &Key {
        self.forest.principal(self.index)
    }

    /// Returns the user ID the key was picked by.
    pub fn identity(&self) -> &UserIdentity {
        &self.key().uids[self.uid]
    }

    /// Returns the key ID to hand to the backend.
    ///
    /// With `ignore_subkeys`, subkeys are referred to by their
    /// principal key.
    pub fn keyid(&self, long: bool, ignore_subkeys: bool) -> String {
        if ignore_subkeys {
            self.principal().display_id(long)
        } else {
            self.key().display_id(long)
        }
    }
}

/// Presents keys to the user.
pub struct KeySelector<'a> {
    ui: &'a dyn Interaction,
    keys: &'a dyn KeySource,
    order: SortOrder,
    entry_format: &'a str,
    long_ids: bool,
    show_unusable: bool,
    check_trust: bool,
}

impl<'a> KeySelector<'a> {
    pub fn new(ui: &'a dyn Interaction, keys: &'a dyn KeySource) -> Self {
        KeySelector {
            ui,
            keys,
            order: SortOrder::default(),
            entry_format: entry::DEFAULT_FORMAT,
            long_ids: false,
            show_unusable: false,
            check_trust: true,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn entry_format(mut self, format: &'a str) -> Self {
        self.entry_format = format;
        self
    }

    pub fn long_ids(mut self, long_ids: bool) -> Self {
        self.long_ids = long_ids;
        self
    }

    pub fn show_unusable(mut self, show: bool) -> Self {
        self.show_unusable = show;
        self
    }

    pub fn check_trust(mut self, check: bool) -> Self {
        self.check_trust = check;
        self
    }

    /// Returns the ranked candidates.
    ///
    /// Unusable keys are left out unless configured otherwise.  If
    /// `abilities` is not empty, keys without any of them are left
    /// out.
    pub fn candidates(&self, forest: &KeyForest, abilities: KeyFlags)
                      -> Vec<Candidate>
    {
        let mut candidates: Vec<Candidate> = forest.iter()
            .filter(|(i, _)| self.show_unusable || ! forest.is_unusable(*i))
            .filter(|(_, k)| abilities.is_empty()
                    || k.flags.intersects(abilities))
            .flat_map(|(i, k)| (0..k.uids.len())
                      .map(move |uid| Candidate { key: i, uid }))
            .collect();

        candidates.sort_by(
            |a, b| self.order.compare(forest, self.long_ids, a, b));
        candidates
    }

    /// Returns whether the candidate is bound to `mailbox` with full
    /// trust, and usable.
    pub fn is_strong(forest: &KeyForest, candidate: &Candidate, mailbox: &str)
                     -> bool
    {
        let uid = candidate.identity(forest);
        uid.trust == Trust::Full
            && ! forest.is_unusable(candidate.key)
            && uid.mailbox().eq_ignore_ascii_case(mailbox)
    }

    /// Picks a key from `forest`.
    ///
    /// A key is picked without asking if there is no doubt: for an
    /// address, when exactly one key matches (a principal and its
    /// subkey are two keys) and it is strongly bound
    /// to the address; for a string, when there is exactly one
    /// candidate that needs no confirmation.
    pub fn select(&self, forest: KeyForest, abilities: KeyFlags,
                  query: KeyQuery)
                  -> Result<SelectedKey>
    {
        tracer!(TRACE, "KeySelector::select");

        let candidates = self.candidates(&forest, abilities);
        if candidates.is_empty() {
            return Err(Error::KeyNotFound(query.what().into()).into());
        }

        let mut matching: Vec<KeyIndex> = candidates.iter()
            .map(|c| c.key)
            .collect();
        matching.sort();
        matching.dedup();

        let automatic = match query {
            KeyQuery::Address(mailbox) if matching.len() == 1 =>
                candidates.iter()
                .find(|c| Self::is_strong(&forest, c, mailbox))
                .cloned(),
            KeyQuery::String(_) if candidates.len() == 1
                && self.acceptable_without_asking(&forest, &candidates[0]) =>
                Some(candidates[0]),
            _ => None,
        };
        if let Some(c) = automatic {
            t!("Selected {} without asking", forest.get(c.key).keyid);
            return Ok(SelectedKey::new(forest, c.key, c.uid));
        }

        let entries = candidates.iter().enumerate()
            .map(|(i, c)| entry::format_entry(
                self.entry_format, i + 1, &forest, c, self.long_ids))
            .collect::<Vec<_>>();
        let title = query.title();

        let mut current = 0;
        loop {
            let selection = self.ui.select(&title, &entries, current)?;
            t!("{:?}", selection);
            let i = match selection {
                Selection::Cancelled =>
                    return Err(Error::SelectionCancelled.into()),
                Selection::Chosen(i) | Selection::VerifyKey(i)
                    | Selection::ViewId(i) => i,
            };
            let c = *candidates.get(i).ok_or_else(
                || anyhow::anyhow!("No candidate number {}", i + 1))?;
            current = i;

            match selection {
                Selection::VerifyKey(_) => self.verify_key(&forest, &c)?,
                Selection::ViewId(_) =>
                    self.ui.notify(&c.identity(&forest).address),
                _ => {
                    if self.confirm(&forest, &c)? {
                        return Ok(SelectedKey::new(forest, c.key, c.uid));
                    }
                }
            }
        }
    }

    fn acceptable_without_asking(&self, forest: &KeyForest, c: &Candidate)
                                 -> bool
    {
        ! self.check_trust
            || (! forest.is_unusable(c.key)
                && c.identity(forest).trust == Trust::Full)
    }

    /// Shows the backend's view of the candidate's key.
    fn verify_key(&self, forest: &KeyForest, c: &Candidate) -> Result<()> {
        let id = format!("0x{}",
                         forest.principal(c.key).display_id(self.long_ids));
        match self.keys.describe(&id) {
            Ok(text) => self.ui.show(&format!("Key ID: {}", id), &text),
            Err(e) => {
                self.ui.notify(&format!("Can't check key {}: {}", id, e));
                Ok(())
            }
        }
    }

    /// Checks the choice, and asks for confirmation if need be.
    ///
    /// Returns false if the user should choose again.
    fn confirm(&self, forest: &KeyForest, c: &Candidate) -> Result<bool> {
        if ! self.check_trust {
            return Ok(true);
        }

        if forest.is_unusable(c.key) {
            self.ui.notify("This key can't be used: expired/disabled/revoked.");
            return Ok(false);
        }

        let reason = match c.identity(forest).trust {
            Trust::Full => return Ok(true),
            Trust::Undefined => "This ID's trust level is undefined.",
            Trust::None => "This ID is not trusted.",
            Trust::Marginal => "This ID is only marginally trusted.",
        };

        match self.ui.prompt_yes_no(
            &format!("{} Do you really want to use it?", reason), Answer::No)?
        {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            Answer::Abort => Err(Error::SelectionCancelled.into()),
        }
    }
}
