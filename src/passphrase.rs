//! Caches the passphrase.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use sequoia_openpgp as openpgp;
use openpgp::crypto::Password;

use crate::ui::PromptText;

const TRACE: bool = false;

/// The prompt used to ask for the passphrase.
pub const PROMPT: &str = "Enter PGP passphrase:";

/// The environment variables that indicate a running agent.
const AGENT_INDICATORS: &[&str] = &["GPG_AGENT_INFO", "GPG_TTY"];

/// Returns whether an agent should be used.
///
/// That is the case if it is enabled in the configuration, and the
/// environment indicates that one is reachable.
pub fn agent_available(use_agent: bool) -> bool {
    use_agent
        && AGENT_INDICATORS.iter().all(|v| std::env::var_os(v).is_some())
}

/// A passphrase with an expiry.
///
/// The secret is held in memory that is protected and zeroed when
/// dropped.
pub struct PassphraseCache {
    secret: Option<Password>,
    expiry: SystemTime,
    timeout: Duration,
    agent: bool,
}

impl PassphraseCache {
    /// Returns an empty cache.
    ///
    /// Passphrases are kept for `timeout`.  If `agent` is set, no
    /// passphrase is ever asked for.
    pub fn new(timeout: Duration, agent: bool) -> Self {
        PassphraseCache {
            secret: None,
            expiry: UNIX_EPOCH,
            timeout,
            agent,
        }
    }

    /// Returns whether the backend's agent handles passphrases.
    pub fn agent(&self) -> bool {
        self.agent
    }

    /// Returns whether the cached passphrase can still be used.
    pub fn is_valid(&self) -> bool {
        self.secret.is_some() && self.expiry > SystemTime::now()
    }

    /// Forgets the passphrase.
    pub fn void(&mut self) {
        tracer!(TRACE, "PassphraseCache::void");
        t!("Forgetting the passphrase");
        // Dropping the password zeroes it.
        self.secret = None;
        self.expiry = UNIX_EPOCH;
    }

    /// Stores a passphrase obtained elsewhere.
    pub fn seed(&mut self, secret: Password) {
        self.secret = Some(secret);
        self.expiry = SystemTime::now() + self.timeout;
    }

    /// Makes sure a passphrase is available, prompting if need be.
    ///
    /// Returns `false` if the user didn't supply one.
    pub fn ensure<P>(&mut self, prompt: &P) -> Result<bool>
    where
        P: PromptText + ?Sized,
    {
        tracer!(TRACE, "PassphraseCache::ensure");

        if self.agent {
            t!("Using the agent");
            return Ok(true);
        }

        if self.is_valid() {
            return Ok(true);
        }

        self.void();
        match prompt.prompt_text(PROMPT, None, true) {
            Ok(Some(p)) => {
                self.seed(p.into());
                Ok(true)
            }
            Ok(None) => {
                t!("Cancelled");
                Ok(false)
            }
            Err(e) => {
                t!("Prompting failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Returns the passphrase, if it is still valid.
    pub fn secret(&self) -> Option<&Password> {
        if self.is_valid() {
            self.secret.as_ref()
        } else {
            None
        }
    }
}
