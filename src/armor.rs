//! Finds ASCII-armored PGP data in text bodies.
//!
//! Mail bodies carry PGP messages, clearsigned texts and public keys
//! inline, surrounded by ordinary text.  [`ArmorScanner`] finds these
//! blocks, and [`ClearsignNormalizer`] turns a clearsigned block back
//! into the text that was signed.

use std::io::Write;
use std::ops::Range;

use anyhow::Result;

use crate::charset::CharsetConverter;
use crate::error::Error;

const TRACE: bool = false;

pub const BEGIN_MESSAGE: &str = "-----BEGIN PGP MESSAGE-----\n";
pub const END_MESSAGE: &str = "-----END PGP MESSAGE-----\n";
pub const BEGIN_SIGNED_MESSAGE: &str = "-----BEGIN PGP SIGNED MESSAGE-----\n";
pub const BEGIN_SIGNATURE: &str = "-----BEGIN PGP SIGNATURE-----\n";
pub const END_SIGNATURE: &str = "-----END PGP SIGNATURE-----\n";
pub const BEGIN_PUBLIC_KEY_BLOCK: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n";
pub const END_PUBLIC_KEY_BLOCK: &str = "-----END PGP PUBLIC KEY BLOCK-----\n";

/// The common prefix of all begin markers.
pub const BEGIN_PREFIX: &str = "-----BEGIN PGP ";

/// The kinds of armored blocks we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    /// An encrypted or signed message.
    EncryptedMessage,
    /// A cleartext signature framework message.
    ClearSignedMessage,
    /// A transferable public key.
    PublicKeyBlock,
}

impl ArmorKind {
    /// Classifies a line, returning the kind if it is a begin marker.
    pub fn from_begin_line(line: &[u8]) -> Option<Self> {
        if line == BEGIN_MESSAGE.as_bytes() {
            Some(ArmorKind::EncryptedMessage)
        } else if line == BEGIN_SIGNED_MESSAGE.as_bytes() {
            Some(ArmorKind::ClearSignedMessage)
        } else if line == BEGIN_PUBLIC_KEY_BLOCK.as_bytes() {
            Some(ArmorKind::PublicKeyBlock)
        } else {
            None
        }
    }

    /// Returns the line that ends a block of this kind.
    pub fn end_line(&self) -> &'static str {
        match self {
            ArmorKind::EncryptedMessage => END_MESSAGE,
            ArmorKind::ClearSignedMessage => END_SIGNATURE,
            ArmorKind::PublicKeyBlock => END_PUBLIC_KEY_BLOCK,
        }
    }
}

/// A block found by the scanner.
///
/// The range is relative to the scanned input.  For clearsigned
/// messages, it ends right before the signature's begin marker, so it
/// covers the signed text.  For all other kinds, it includes the end
/// marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmorRegion {
    pub kind: ArmorKind,
    pub range: Range<usize>,
}

/// A region together with the raw bytes of the whole block.
///
/// `raw` always runs through the block's end marker, so it can be
/// handed to the backend as-is.
#[derive(Debug)]
pub struct ArmoredBlock<'a> {
    pub region: ArmorRegion,
    pub raw: &'a [u8],
}

/// Splits `input` into lines, keeping the line terminators, and
/// pairs each line with its offset.
pub(crate) fn lines(input: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let mut offset = 0;
    input.split_inclusive(|&b| b == b'\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line)
    })
}

/// Finds armored blocks in text.
///
/// The scanner is a two state machine.  While scanning, every line
/// that is not a begin marker is passed through to the output, with
/// the prefix prepended.  A begin marker switches into the block
/// state, which lasts until the matching end marker.  Complete blocks
/// are handed to the caller's callback, which writes whatever it
/// wants to show in place of the block.
#[derive(Debug, Clone, Default)]
pub struct ArmorScanner<'a> {
    prefix: Option<&'a str>,
    ignore_keys: bool,
}

impl<'a> ArmorScanner<'a> {
    /// Returns a scanner without a prefix that handles all kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `prefix` to every line passed through, e.g. a quote
    /// marker.
    pub fn prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Controls whether public key blocks are recognized.
    ///
    /// If not, they are passed through like any other text.
    pub fn handle_keys(mut self, handle: bool) -> Self {
        self.ignore_keys = ! handle;
        self
    }

    fn begin(&self, line: &[u8]) -> Option<ArmorKind> {
        match ArmorKind::from_begin_line(line) {
            Some(ArmorKind::PublicKeyBlock) if self.ignore_keys => None,
            kind => kind,
        }
    }

    fn passthrough(&self, line: &[u8], out: &mut dyn Write) -> Result<()> {
        if let Some(prefix) = self.prefix {
            out.write_all(prefix.as_bytes())?;
        }
        out.write_all(line)?;
        Ok(())
    }

    /// Scans `input`, writing the text between blocks to `out`.
    ///
    /// Returns the regions that were found.  If the input ends inside
    /// a block, the partial block is passed through unchanged, and
    /// [`Error::MalformedArmor`] is returned.
    pub fn scan<F>(&self, input: &[u8], out: &mut dyn Write, mut handle: F)
                   -> Result<Vec<ArmorRegion>>
    where
        F: FnMut(ArmoredBlock, &mut dyn Write) -> Result<()>,
    {
        tracer!(TRACE, "ArmorScanner::scan");

        let mut regions = Vec::new();
        let mut input_lines = lines(input);

        while let Some((start, line)) = input_lines.next() {
            let kind = if let Some(kind) = self.begin(line) {
                kind
            } else {
                self.passthrough(line, out)?;
                continue;
            };

            t!("{:?} begins at {}", kind, start);
            let end_line = kind.end_line().as_bytes();
            let mut signature_start = None;
            let mut end = None;
            for (offset, line) in input_lines.by_ref() {
                if kind == ArmorKind::ClearSignedMessage
                    && signature_start.is_none()
                    && line == BEGIN_SIGNATURE.as_bytes()
                {
                    signature_start = Some(offset);
                }
                if line == end_line {
                    end = Some(offset + line.len());
                    break;
                }
            }

            let end = if let Some(end) = end {
                end
            } else {
                t!("No end of block found");
                for (_, line) in lines(&input[start..]) {
                    self.passthrough(line, out)?;
                }
                return Err(Error::MalformedArmor(
                    format!("no end of block found for the block starting \
                             at byte {}", start)).into());
            };

            let region = ArmorRegion {
                kind,
                range: start..signature_start.unwrap_or(end),
            };
            regions.push(region.clone());
            handle(ArmoredBlock { region, raw: &input[start..end] }, out)?;
        }

        Ok(regions)
    }
}

/// Recovers the signed text from a clearsigned block.
///
/// Skips the armor header, i.e. everything up to the first blank
/// line, stops at the signature, and removes the dash escaping.  The
/// block is decoded from its declared charset before unescaping.
pub struct ClearsignNormalizer<'a> {
    converter: &'a dyn CharsetConverter,
    charset: Option<&'a str>,
    prefix: Option<&'a str>,
}

impl<'a> ClearsignNormalizer<'a> {
    pub fn new(converter: &'a dyn CharsetConverter) -> Self {
        ClearsignNormalizer {
            converter,
            charset: None,
            prefix: None,
        }
    }

    /// Sets the charset the block is encoded in.
    ///
    /// Without a charset, the block is assumed to be UTF-8.
    pub fn charset(mut self, charset: Option<&'a str>) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the prefix prepended to every emitted line.
    pub fn prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Writes the signed text of `block` to `out`.
    pub fn normalize(&self, block: &[u8], out: &mut dyn Write) -> Result<()> {
        let text = self.converter.decode(self.charset.unwrap_or("utf-8"), block)?;

        let mut in_header = true;
        for line in text.split_inclusive('\n') {
            if in_header {
                if line.trim().is_empty() {
                    in_header = false;
                }
                continue;
            }

            if line == BEGIN_SIGNATURE {
                break;
            }

            if let Some(prefix) = self.prefix {
                out.write_all(prefix.as_bytes())?;
            }
            out.write_all(line.strip_prefix("- ").unwrap_or(line).as_bytes())?;
        }

        Ok(())
    }
}
