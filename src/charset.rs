//! Character set decoding.
//!
//! Converting between character sets is the job of the surrounding
//! mail client.  We only need to turn a text body in some declared
//! charset into UTF-8, so that is the interface we consume.

use anyhow::Result;

const TRACE: bool = false;

/// Decodes text in a declared character set to UTF-8.
pub trait CharsetConverter {
    /// Decodes `data`, which is encoded using `charset`.
    fn decode(&self, charset: &str, data: &[u8]) -> Result<String>;
}

/// Returns whether `charset` names US-ASCII.
pub fn is_us_ascii(charset: &str) -> bool {
    ["us-ascii", "ascii", "ansi_x3.4-1968", "iso646-us"]
        .iter()
        .any(|name| charset.eq_ignore_ascii_case(name))
}

/// Returns whether `charset` names UTF-8.
pub fn is_utf8(charset: &str) -> bool {
    charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8")
}

/// The converter used when the caller doesn't supply one.
///
/// Handles UTF-8, US-ASCII and Latin-1.  Anything else is decoded as
/// UTF-8, replacing invalid sequences.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCharsets;

impl CharsetConverter for BuiltinCharsets {
    fn decode(&self, charset: &str, data: &[u8]) -> Result<String> {
        tracer!(TRACE, "BuiltinCharsets::decode");

        let latin1 = ["iso-8859-1", "iso8859-1", "latin1", "l1"]
            .iter()
            .any(|name| charset.eq_ignore_ascii_case(name));

        if latin1 {
            // Latin-1 maps each byte to the code point of the same
            // value.
            Ok(data.iter().map(|&b| char::from(b)).collect())
        } else {
            if ! is_utf8(charset) && ! is_us_ascii(charset) {
                t!("Unsupported charset {:?}, assuming UTF-8", charset);
            }
            Ok(String::from_utf8_lossy(data).into_owned())
        }
    }
}
