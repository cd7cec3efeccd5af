//! A minimal MIME part model.
//!
//! Composing and parsing mail is the mail client's job.  This is just
//! enough structure to wrap bodies into the PGP/MIME containers, and
//! to split decrypted output into headers and body.  Bodies are kept
//! in their transfer encoding.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};

use sequoia_openpgp as openpgp;

const TRACE: bool = false;

/// A Content-Transfer-Encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
}

impl Encoding {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Some(Encoding::SevenBit),
            "8bit" => Some(Encoding::EightBit),
            "binary" => Some(Encoding::Binary),
            "quoted-printable" => Some(Encoding::QuotedPrintable),
            "base64" => Some(Encoding::Base64),
            _ => None,
        }
    }

    /// Returns the encoding suitable for `body`.
    pub fn for_body(body: &[u8]) -> Self {
        if body.is_ascii() {
            Encoding::SevenBit
        } else {
            Encoding::EightBit
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Encoding::SevenBit => "7bit",
            Encoding::EightBit => "8bit",
            Encoding::Binary => "binary",
            Encoding::QuotedPrintable => "quoted-printable",
            Encoding::Base64 => "base64",
        })
    }
}

/// A Content-Disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        })
    }
}

/// A MIME body part.
#[derive(Debug, Clone)]
pub struct Part {
    /// The media type, e.g. `text`.  Always lowercase.
    pub mime_type: String,
    /// The subtype, e.g. `plain`.  Always lowercase.
    pub subtype: String,
    params: Vec<(String, String)>,
    pub encoding: Option<Encoding>,
    /// Whether a disposition header is written.
    pub disposition: Option<Disposition>,
    pub filename: Option<String>,
    pub description: Option<String>,
    /// The body of a leaf part.
    pub body: Vec<u8>,
    /// The subparts of a multipart.
    pub parts: Vec<Part>,
    /// The bytes this part was parsed from.
    raw: Option<Vec<u8>>,
}

/// Parts are equal if they serialize alike.
impl PartialEq for Part {
    fn eq(&self, other: &Self) -> bool {
        self.mime_type == other.mime_type
            && self.subtype == other.subtype
            && self.params == other.params
            && self.encoding == other.encoding
            && self.disposition == other.disposition
            && self.filename == other.filename
            && self.description == other.description
            && self.body == other.body
            && self.parts == other.parts
    }
}

impl Eq for Part {}

impl Default for Part {
    fn default() -> Self {
        Part::new("text", "plain")
    }
}

impl Part {
    /// Returns an empty part.
    pub fn new(mime_type: &str, subtype: &str) -> Self {
        Part {
            mime_type: mime_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: Vec::new(),
            encoding: None,
            disposition: None,
            filename: None,
            description: None,
            body: Vec::new(),
            parts: Vec::new(),
            raw: None,
        }
    }

    /// Returns a leaf part.
    pub fn leaf(mime_type: &str, subtype: &str, body: Vec<u8>) -> Self {
        let mut part = Part::new(mime_type, subtype);
        part.encoding = Some(Encoding::for_body(&body));
        part.body = body;
        part
    }

    /// Returns a text/plain part.
    pub fn text<B: Into<Vec<u8>>>(body: B, charset: &str) -> Self {
        let mut part = Part::leaf("text", "plain", body.into());
        part.set_param("charset", charset);
        part
    }

    /// Returns a multipart with a fresh boundary.
    pub fn multipart(subtype: &str, parts: Vec<Part>) -> Result<Self> {
        let mut part = Part::new("multipart", subtype);
        part.set_param("boundary", &generate_boundary()?);
        part.parts = parts;
        Ok(part)
    }

    /// Returns whether this part has the given type.
    ///
    /// `*` matches any subtype.
    pub fn is(&self, mime_type: &str, subtype: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
            && (subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type == "multipart"
    }

    /// Returns the content type, e.g. `text/plain`.
    pub fn content_type(&self) -> String {
        format!("{}/{}", self.mime_type, self.subtype)
    }

    /// Returns the value of a content type parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a content type parameter, replacing an existing one.
    pub fn set_param(&mut self, name: &str, value: &str) {
        self.raw = None;
        match self.params.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.into(),
            None => self.params.push((name.to_ascii_lowercase(), value.into())),
        }
    }

    pub fn remove_param(&mut self, name: &str) {
        self.raw = None;
        self.params.retain(|(n, _)| ! n.eq_ignore_ascii_case(name));
    }

    /// Returns the charset, defaulting to us-ascii.
    pub fn charset(&self) -> &str {
        self.param("charset").unwrap_or("us-ascii")
    }

    /// Writes the headers and the body.
    pub fn serialize(&self, out: &mut dyn Write) -> Result<()> {
        write!(out, "Content-Type: {}", self.content_type())?;
        for (name, value) in &self.params {
            write!(out, "; {}={}", name, quote(value))?;
        }
        writeln!(out)?;

        if let Some(encoding) = self.encoding {
            writeln!(out, "Content-Transfer-Encoding: {}", encoding)?;
        }
        if let Some(disposition) = self.disposition {
            write!(out, "Content-Disposition: {}", disposition)?;
            if let Some(filename) = &self.filename {
                write!(out, "; filename={}", quote(filename))?;
            }
            writeln!(out)?;
        }
        if let Some(description) = &self.description {
            writeln!(out, "Content-Description: {}", description)?;
        }
        writeln!(out)?;

        if self.is_multipart() {
            let boundary = self.param("boundary")
                .ok_or_else(|| anyhow::anyhow!(
                    "{} part without a boundary", self.content_type()))?;
            for part in &self.parts {
                writeln!(out, "--{}", boundary)?;
                part.serialize(out)?;
                writeln!(out)?;
            }
            writeln!(out, "--{}--", boundary)?;
        } else {
            out.write_all(&self.body)?;
        }
        Ok(())
    }

    /// Returns the serialized part.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Returns the bytes this part was parsed from, or the serialized
    /// part if it was built in memory.
    ///
    /// Signatures are over the original bytes, which serializing does
    /// not reproduce.
    pub fn original_bytes(&self) -> Result<Vec<u8>> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => self.to_vec(),
        }
    }

    /// Splits `data` into headers and body, and parses the headers
    /// we care about.
    ///
    /// Multipart bodies are split along their boundary.  Without a
    /// Content-Type header, the part is text/plain.
    pub fn parse(data: &[u8]) -> Result<Self> {
        tracer!(TRACE, "Part::parse");

        let (headers, body) = split_headers(data);
        let mut part = Part::default();

        for (name, value) in unfold(headers) {
            match name.to_ascii_lowercase().as_str() {
                "content-type" => {
                    let (value, params) = parse_params(&value);
                    let (mime_type, subtype) = value.split_once('/')
                        .unwrap_or(("text", "plain"));
                    part.mime_type = mime_type.trim().to_ascii_lowercase();
                    part.subtype = subtype.trim().to_ascii_lowercase();
                    part.params = params;
                }
                "content-transfer-encoding" =>
                    part.encoding = Encoding::parse(&value),
                "content-disposition" => {
                    let (value, params) = parse_params(&value);
                    part.disposition = match value.to_ascii_lowercase().as_str() {
                        "attachment" => Some(Disposition::Attachment),
                        _ => Some(Disposition::Inline),
                    };
                    part.filename = params.into_iter()
                        .find(|(n, _)| n == "filename")
                        .map(|(_, v)| v);
                }
                "content-description" => part.description = Some(value),
                _ => (),
            }
        }

        if part.is_multipart() {
            let boundary = part.param("boundary")
                .ok_or_else(|| anyhow::anyhow!(
                    "{} part without a boundary", part.content_type()))?
                .to_string();
            for body in split_multipart(body, &boundary) {
                part.parts.push(Part::parse(body)
                                .context("Parsing a subpart failed")?);
            }
            t!("{} with {} parts", part.content_type(), part.parts.len());
        } else {
            part.body = body.to_vec();
        }
        part.raw = Some(data.to_vec());

        Ok(part)
    }
}

/// Returns a random multipart boundary.
pub fn generate_boundary() -> Result<String> {
    let mut buf = [0u8; 12];
    openpgp::crypto::random(&mut buf)?;
    Ok(openpgp::fmt::hex::encode(buf))
}

/// Quotes a parameter value if needed.
fn quote(value: &str) -> String {
    const SPECIALS: &str = "()<>@,;:\\\"/[]?= \t";
    if ! value.is_empty() && ! value.chars().any(|c| SPECIALS.contains(c)) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Splits at the first empty line.
fn split_headers(data: &[u8]) -> (&[u8], &[u8]) {
    if data.starts_with(b"\n") {
        return (&[], &data[1..]);
    }
    if data.starts_with(b"\r\n") {
        return (&[], &data[2..]);
    }

    let mut offset = 0;
    for line in data.split_inclusive(|&b| b == b'\n') {
        offset += line.len();
        if line == b"\n" || line == b"\r\n" {
            return (&data[..offset - line.len()], &data[offset..]);
        }
    }
    (data, &[])
}

/// Unfolds header lines into name/value pairs.
fn unfold(headers: &[u8]) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for line in String::from_utf8_lossy(headers).lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = fields.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().into(), value.trim().into()));
        }
    }
    fields
}

/// Splits `value; a=b; c="d"` into the value and its parameters.
fn parse_params(value: &str) -> (String, Vec<(String, String)>) {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = ! quoted,
            ';' if ! quoted => items.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    items.push(current);

    let mut items = items.into_iter();
    let value = items.next().unwrap_or_default().trim().to_string();
    let params = items
        .filter_map(|item| {
            let (name, value) = item.split_once('=')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect();
    (value, params)
}

/// Returns the bodies of a multipart's subparts.
///
/// The line break before a delimiter belongs to the delimiter.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
        let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
        if let Some(rest) = trimmed.strip_prefix(delimiter.as_bytes()) {
            let closing = rest.starts_with(b"--");
            if rest.iter().all(u8::is_ascii_whitespace) || closing {
                if let Some(s) = start {
                    let mut end = offset;
                    if body[..end].ends_with(b"\n") {
                        end -= 1;
                        if body[..end].ends_with(b"\r") {
                            end -= 1;
                        }
                    }
                    parts.push(&body[s..end.max(s)]);
                }
                if closing {
                    return parts;
                }
                start = Some(offset + line.len());
            }
        }
        offset += line.len();
    }

    if let Some(s) = start {
        parts.push(&body[s..]);
    }
    parts
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn params() {
        let mut part = Part::text("hi\n", "utf-8");
        assert_eq!(part.param("Charset"), Some("utf-8"));
        part.set_param("CHARSET", "us-ascii");
        assert_eq!(part.charset(), "us-ascii");
        part.set_param("x-action", "pgp-signed");
        part.remove_param("charset");
        assert_eq!(part.param("charset"), None);
        assert_eq!(part.charset(), "us-ascii");
        assert!(part.is("TEXT", "*"));
        assert!(part.is("text", "plain"));
        assert!(! part.is("text", "html"));
    }

    #[test]
    fn serialize_leaf() {
        let mut part = Part::leaf("application", "octet-stream", b"data\n".to_vec());
        part.set_param("name", "msg.asc");
        part.disposition = Some(Disposition::Inline);
        part.filename = Some("msg.asc".into());
        part.description = Some("OpenPGP encrypted message".into());
        assert_eq!(String::from_utf8(part.to_vec().unwrap()).unwrap(),
                   "Content-Type: application/octet-stream; name=msg.asc\n\
                    Content-Transfer-Encoding: 7bit\n\
                    Content-Disposition: inline; filename=msg.asc\n\
                    Content-Description: OpenPGP encrypted message\n\
                    \n\
                    data\n");
    }

    #[test]
    fn quoting() {
        let mut part = Part::new("multipart", "signed");
        part.set_param("protocol", "application/pgp-signature");
        assert!(part.to_vec().unwrap_err().to_string().contains("boundary"));
        part.set_param("boundary", "b");
        let s = String::from_utf8(part.to_vec().unwrap()).unwrap();
        assert!(s.starts_with("Content-Type: multipart/signed; \
                               protocol=\"application/pgp-signature\"; \
                               boundary=b\n"));
    }

    #[test]
    fn parse_leaf() {
        let part = Part::parse(b"Content-Type: text/plain;\n\
                                 \tcharset=\"ISO-8859-1\"\n\
                                 Content-Transfer-Encoding: 8bit\n\
                                 X-Other: ignored\n\
                                 \n\
                                 body\n").unwrap();
        assert_eq!(part.content_type(), "text/plain");
        assert_eq!(part.charset(), "ISO-8859-1");
        assert_eq!(part.encoding, Some(Encoding::EightBit));
        assert_eq!(part.body, b"body\n");

        let part = Part::parse(b"\nno headers\n").unwrap();
        assert!(part.is("text", "plain"));
        assert_eq!(part.body, b"no headers\n");
    }

    #[test]
    fn multipart_round_trip() {
        let mut attachment = Part::leaf("application", "pgp-keys", b"KEY\n".to_vec());
        attachment.disposition = Some(Disposition::Attachment);
        attachment.filename = Some("my key.asc".into());
        let part = Part::multipart(
            "mixed", vec![Part::text("first\n", "us-ascii"), attachment])
            .unwrap();
        let boundary = part.param("boundary").unwrap();
        assert_eq!(boundary.len(), 24);

        let parsed = Part::parse(&part.to_vec().unwrap()).unwrap();
        assert!(parsed.is("multipart", "mixed"));
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.parts[0].body, b"first\n");
        assert_eq!(parsed.parts[1].filename.as_deref(), Some("my key.asc"));
        assert_eq!(parsed.parts[1].disposition, Some(Disposition::Attachment));
        assert_eq!(parsed, part);
    }

    #[test]
    fn multipart_preamble_and_crlf() {
        let data = b"Content-Type: multipart/encrypted; boundary=XY\r\n\
                     \r\n\
                     preamble\r\n\
                     --XY\r\n\
                     Content-Type: application/pgp-encrypted\r\n\
                     \r\n\
                     Version: 1\r\n\
                     \r\n\
                     --XY\r\n\
                     Content-Type: application/octet-stream\r\n\
                     \r\n\
                     CIPHER\r\n\
                     --XY--\r\n\
                     epilogue\r\n";
        let part = Part::parse(data).unwrap();
        assert_eq!(part.parts.len(), 2);
        assert_eq!(part.parts[0].body, b"Version: 1\r\n");
        assert!(part.parts[1].is("application", "octet-stream"));
        assert_eq!(part.parts[1].body, b"CIPHER");
    }

    #[test]
    fn original_bytes() {
        let data = b"Content-Type: text/plain; charset=\"us-ascii\"\n\
                     Content-ID: <x@example.org>\n\
                     \n\
                     Hello\n";
        let mut part = Part::parse(data).unwrap();
        assert_eq!(part.original_bytes().unwrap(), data);
        assert_eq!(part.body, b"Hello\n");

        part.set_param("format", "fixed");
        assert_eq!(part.original_bytes().unwrap(), part.to_vec().unwrap());
    }
}
