//! Formats entries of the key selection menu.
//!
//! The format is a string with printf-like escapes:
//!
//!   - `%n`: the entry's number,
//!   - `%k`: the key ID,
//!   - `%u`: the user ID,
//!   - `%a`: the algorithm,
//!   - `%l`: the key length,
//!   - `%f`: a flag: `R` revoked, `X` expired, `d` disabled,
//!     `c` critical,
//!   - `%c`: the capabilities, e.g. `es`,
//!   - `%t`: the validity of the user ID,
//!   - `%[fmt]`: the creation time, formatted using strftime-like
//!     `fmt`.
//!
//! The uppercase variants `%K`, `%A`, `%L`, `%F`, and `%C` show the
//! principal key's property.  A field width and `-` for left
//! alignment may be given between `%` and the escape, e.g. `%-4a`.

use chrono::Local;
use chrono::format::{Item, StrftimeItems};

use crate::keys::{KeyFlags, KeyForest};
use crate::select::Candidate;

/// The default menu entry format.
pub const DEFAULT_FORMAT: &str = "%4n %t%f %4l/0x%k %-4a %2c %u";

/// Returns the flag character.
fn flag_char(flags: KeyFlags) -> char {
    if flags.contains(KeyFlags::REVOKED) {
        'R'
    } else if flags.contains(KeyFlags::EXPIRED) {
        'X'
    } else if flags.contains(KeyFlags::DISABLED) {
        'd'
    } else if flags.contains(KeyFlags::CRITICAL) {
        'c'
    } else {
        ' '
    }
}

/// Returns the two capability characters.
fn abilities(flags: KeyFlags) -> String {
    let encrypt = if ! flags.contains(KeyFlags::CAN_ENCRYPT) {
        '-'
    } else if flags.contains(KeyFlags::PREFER_SIGNING) {
        '.'
    } else {
        'e'
    };
    let sign = if ! flags.contains(KeyFlags::CAN_SIGN) {
        '-'
    } else if flags.contains(KeyFlags::PREFER_ENCRYPTION) {
        '.'
    } else {
        's'
    };
    [encrypt, sign].iter().collect()
}

/// Pads `value` to `width`.
fn pad(out: &mut String, value: &str, width: Option<usize>, left: bool) {
    match width {
        Some(w) if left => out.push_str(&format!("{:<1$}", value, w)),
        Some(w) => out.push_str(&format!("{:>1$}", value, w)),
        None => out.push_str(value),
    }
}

/// Formats a menu entry.
///
/// `number` is the entry's one-based position in the menu.
pub fn format_entry(format: &str, number: usize, forest: &KeyForest,
                    candidate: &Candidate, long_ids: bool)
                    -> String
{
    let uid = candidate.identity(forest);
    let mut out = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let left = chars.next_if_eq(&'-').is_some();
        let mut digits = String::new();
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            digits.push(d);
        }
        let width = digits.parse::<usize>().ok();

        let Some(op) = chars.next() else {
            out.push('%');
            break;
        };

        let (key, flags) = if op.is_ascii_uppercase() {
            let principal = forest.principal(candidate.key);
            (principal, principal.flags)
        } else {
            (forest.get(candidate.key), forest.effective_flags(candidate.key))
        };

        let value = match op.to_ascii_lowercase() {
            '%' => "%".to_string(),
            'n' => number.to_string(),
            'k' => key.display_id(long_ids),
            'u' => uid.address.clone(),
            'a' => key.algorithm.to_string(),
            'l' => key.length.to_string(),
            'f' => flag_char(flags).to_string(),
            'c' => abilities(flags),
            't' => uid.trust.as_char().to_string(),
            '[' => {
                let mut spec = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    spec.push(c);
                }
                // We don't do locales, so `!` makes no difference.
                let spec = spec.strip_prefix('!').unwrap_or(&spec);
                if StrftimeItems::new(spec).any(|i| matches!(i, Item::Error)) {
                    spec.to_string()
                } else {
                    key.created.with_timezone(&Local).format(spec).to_string()
                }
            }
            _ => String::new(),
        };
        pad(&mut out, &value, width, left);
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::keys::parse_listing;
    use crate::keys::test::ALICE;

    fn candidate(key: usize, uid: usize) -> Candidate {
        let forest = parse_listing(ALICE.as_bytes()).unwrap();
        let (key, _) = forest.iter().nth(key).unwrap();
        Candidate { key, uid }
    }

    #[test]
    fn default_format() {
        let forest = parse_listing(ALICE.as_bytes()).unwrap();
        let entry = format_entry(DEFAULT_FORMAT, 1, &forest, &candidate(1, 0),
                                 false);
        assert_eq!(entry,
                   "   1 +  3072/0xAAAA2222 RSA  e- Alice Example <alice@example.org>");
    }

    #[test]
    fn principal_and_long_ids() {
        let forest = parse_listing(ALICE.as_bytes()).unwrap();
        let c = candidate(1, 1);
        assert_eq!(format_entry("%K|%k|%C|%c|%t", 12, &forest, &c, true),
                   "AAAA1111AAAA1111|AAAA2222AAAA2222|-s|e-| ");
        assert_eq!(format_entry("[%-3n]", 7, &forest, &c, false), "[7  ]");
        assert_eq!(format_entry("100%%", 1, &forest, &c, false), "100%");
    }

    #[test]
    fn flags_are_inherited() {
        let listing = ALICE.replace("pub:f:3072", "pub:r:3072");
        let forest = parse_listing(listing.as_bytes()).unwrap();
        let c = candidate(1, 0);
        assert_eq!(format_entry("%f%F", 1, &forest, &c, false), "RR");

        let listing = ALICE.replace("sub:f:3072", "sub:e:3072");
        let forest = parse_listing(listing.as_bytes()).unwrap();
        assert_eq!(format_entry("[%f%F]", 1, &forest, &c, false), "[X ]");
    }

    #[test]
    fn dates() {
        let forest = parse_listing(ALICE.as_bytes()).unwrap();
        let c = candidate(0, 0);
        let year = forest.get(c.key).created.with_timezone(&Local)
            .format("%Y").to_string();
        assert_eq!(format_entry("%[%Y]", 1, &forest, &c, false), year);
        assert_eq!(format_entry("%[!%Y] x", 1, &forest, &c, false),
                   format!("{} x", year));
    }
}
