//! Safely displays data from untrusted sources.
//!
//! User IDs and backend output come from other people's keys and may
//! contain control characters meant to mess with the terminal.

use std::fmt;

use crate::keys::UserIdentity;

/// Safely displays values.
pub struct Safe<T>(pub T);

impl fmt::Display for Safe<&UserIdentity> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Safe(self.0.address.as_str()))
    }
}

impl fmt::Display for Safe<&str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().any(char::is_control) {
            write!(f, "{:?}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(Safe("Alice <alice@example.org>").to_string(),
                   "Alice <alice@example.org>");
        assert_eq!(Safe("Mallory\x1b[2J").to_string(),
                   "\"Mallory\\u{1b}[2J\"");
    }
}
