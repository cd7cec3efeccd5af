//! The context shared by all operations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;

use sequoia_openpgp as openpgp;
use openpgp::crypto::Password;

use crate::charset::CharsetConverter;
use crate::config::Config;
use crate::keys::KeySource;
use crate::passphrase::{self, PassphraseCache};
use crate::process::{self, ProcessInvoker};
use crate::select::KeySelector;
use crate::ui::Interaction;

const TRACE: bool = false;

/// Everything an operation needs.
///
/// The context owns the configuration, the passphrase cache, and the
/// process invoker, and borrows the collaborators supplied by the
/// mail client: where keys come from, how to talk to the user, and
/// how to convert character sets.
pub struct Pgp<'a> {
    config: Config,
    passphrase: RefCell<PassphraseCache>,
    invoker: ProcessInvoker,
    keys: &'a dyn KeySource,
    ui: &'a dyn Interaction,
    charsets: &'a dyn CharsetConverter,
    /// The key IDs last entered for an address.
    id_defaults: RefCell<HashMap<String, String>>,
}

impl<'a> Pgp<'a> {
    pub fn new(config: Config, invoker: ProcessInvoker,
               keys: &'a dyn KeySource, ui: &'a dyn Interaction,
               charsets: &'a dyn CharsetConverter)
               -> Self
    {
        let agent = passphrase::agent_available(config.use_agent);
        Pgp {
            passphrase: RefCell::new(
                PassphraseCache::new(config.passphrase_timeout, agent)),
            config,
            invoker,
            keys,
            ui,
            charsets,
            id_defaults: Default::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn invoker(&self) -> &ProcessInvoker {
        &self.invoker
    }

    pub fn keys(&self) -> &'a dyn KeySource {
        self.keys
    }

    pub fn ui(&self) -> &'a dyn Interaction {
        self.ui
    }

    pub fn charsets(&self) -> &'a dyn CharsetConverter {
        self.charsets
    }

    /// Returns a key selector configured according to the
    /// configuration.
    pub fn selector(&self) -> KeySelector<'_> {
        KeySelector::new(self.ui, self.keys)
            .order(self.config.sort)
            .entry_format(&self.config.entry_format)
            .long_ids(self.config.long_ids)
            .show_unusable(self.config.show_unusable)
            .check_trust(self.config.check_trust)
    }

    /// Returns whether passphrases are written to the backend.
    ///
    /// That is not the case if the backend's agent takes care of
    /// them.
    pub fn feeds_passphrase(&self) -> bool {
        ! self.passphrase.borrow().agent()
    }

    /// Makes sure a passphrase is at hand, prompting if need be.
    ///
    /// Returns `false` if the user cancelled.
    pub fn ensure_passphrase(&self) -> Result<bool> {
        self.passphrase.borrow_mut().ensure(self.ui)
    }

    /// Uses the given passphrase until it expires.
    pub fn seed_passphrase(&self, secret: Password) {
        self.passphrase.borrow_mut().seed(secret);
    }

    /// Returns whether a cached passphrase is available.
    pub fn has_passphrase(&self) -> bool {
        self.passphrase.borrow().is_valid()
    }

    /// Drops the cached passphrase without telling the user.
    pub(crate) fn void_passphrase(&self) {
        self.passphrase.borrow_mut().void();
    }

    /// Forgets the cached passphrase.
    pub fn forget_passphrase(&self) {
        self.void_passphrase();
        self.ui.notify("PGP passphrase forgotten.");
    }

    /// Writes the passphrase followed by a newline to the backend.
    ///
    /// When the agent takes care of passphrases, only the newline is
    /// written.  Returns whether a passphrase was written.
    pub(crate) fn feed_passphrase(&self, stdin: &mut dyn Write) -> Result<bool> {
        tracer!(TRACE, "Pgp::feed_passphrase");

        let mut fed = false;
        if self.feeds_passphrase() {
            let cache = self.passphrase.borrow();
            if let Some(secret) = cache.secret() {
                secret.map(|p| process::feed(stdin, p))?;
                fed = true;
            } else {
                t!("No passphrase at hand");
            }
        }
        process::feed(stdin, b"\n")?;
        Ok(fed)
    }

    /// Returns the key ID last entered for `mailbox`.
    pub(crate) fn id_default(&self, mailbox: &str) -> Option<String> {
        self.id_defaults.borrow().get(&mailbox.to_lowercase()).cloned()
    }

    /// Remembers the key ID entered for `mailbox`.
    pub(crate) fn set_id_default(&self, mailbox: &str, keyid: &str) {
        self.id_defaults.borrow_mut()
            .insert(mailbox.to_lowercase(), keyid.to_string());
    }
}
