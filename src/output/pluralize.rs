//! Lightweight pluralization support.

use std::fmt;

/// Pluralizes countable things when formatted.
pub struct Pluralized<'t> {
    /// The amount of things we have.
    count: usize,

    /// Of these things.
    thing: &'t str,
}

impl fmt::Display for Pluralized<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}",
               self.count,
               super::wrapping::NBSP,
               self.thing,
               if self.count == 1 { "" } else { "s" })
    }
}

/// Provides convenient pluralization.
pub trait Pluralize<'t> {
    fn of(self, thing: &'t str) -> Pluralized<'t>;
}

impl<'t> Pluralize<'t> for usize {
    fn of(self, thing: &'t str) -> Pluralized<'t> {
        Pluralized {
            count: self,
            thing,
        }
    }
}
