//! Mail addresses of recipients.
//!
//! Only what is needed to look up keys: splitting address lists,
//! separating display names from mailboxes, and qualifying local
//! mailboxes.

use std::fmt;

/// A mail address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// The display name.
    pub name: Option<String>,
    pub mailbox: String,
}

impl Address {
    /// Parses `Name <mailbox>`, `<mailbox>`, or a bare mailbox.
    ///
    /// Returns `None` if there is no mailbox.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (name, mailbox) = match (s.rfind('<'), s.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let name = s[..start].trim().trim_matches('"').trim();
                (Some(name), s[start + 1..end].trim())
            }
            _ => (None, s),
        };

        if mailbox.is_empty() {
            return None;
        }

        Some(Address {
            name: name.filter(|n| ! n.is_empty()).map(Into::into),
            mailbox: mailbox.into(),
        })
    }

    /// Parses a comma-separated list of addresses.
    ///
    /// Commas in quoted display names and in angle brackets don't
    /// separate addresses.
    pub fn parse_list(s: &str) -> Vec<Self> {
        let mut addresses = Vec::new();
        let mut start = 0;
        let mut quoted = false;
        let mut angle = false;

        for (i, c) in s.char_indices() {
            match c {
                '"' if ! angle => quoted = ! quoted,
                '<' if ! quoted => angle = true,
                '>' if ! quoted => angle = false,
                ',' if ! quoted && ! angle => {
                    addresses.extend(Self::parse(&s[start..i]));
                    start = i + 1;
                }
                _ => (),
            }
        }
        addresses.extend(Self::parse(&s[start..]));
        addresses
    }

    /// Returns whether the mailbox lacks a domain.
    pub fn is_local(&self) -> bool {
        ! self.mailbox.contains('@')
    }

    /// Appends `@hostname` to local mailboxes.
    pub fn qualify(&mut self, hostname: &str) {
        if self.is_local() && ! hostname.is_empty() {
            self.mailbox = format!("{}@{}", self.mailbox, hostname);
        }
    }

    /// Returns whether both addresses name the same mailbox.
    pub fn same_mailbox(&self, other: &Address) -> bool {
        self.mailbox.eq_ignore_ascii_case(&other.mailbox)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.mailbox),
            None => write!(f, "{}", self.mailbox),
        }
    }
}
