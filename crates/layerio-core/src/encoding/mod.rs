//! Character encodings.
//!
//! A deliberately small set: the byte-transparent `ASCII-8BIT`, the
//! single-byte `US-ASCII` and `ISO-8859-1`, and the Unicode forms UTF-8,
//! UTF-16 and UTF-32 in both byte orders. Each encoding knows how to find
//! character boundaries ([`Encoding::scan`]), how far a truncated tail is
//! from the next boundary ([`Encoding::incomplete_tail`]), and how to
//! encode a `char`.

mod bom;
mod transcode;

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StreamError};

pub use bom::{bom_may_extend, detect_bom};
pub use transcode::Transcoder;

/// Supported character encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Raw bytes; every byte is one character and nothing is converted.
    Binary,
    UsAscii,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
}

/// Result of looking for one character at the front of a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A valid character occupying the given number of bytes.
    Valid(char, usize),
    /// An invalid sequence of the given length.
    Invalid(usize),
    /// The slice ends inside a character.
    Incomplete,
}

impl Encoding {
    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Binary => "ASCII-8BIT",
            Self::UsAscii => "US-ASCII",
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Utf32Be => "UTF-32BE",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Size of the code unit; characters start on multiples of it.
    #[must_use]
    pub const fn unit_len(self) -> usize {
        match self {
            Self::Utf16Le | Self::Utf16Be => 2,
            Self::Utf32Le | Self::Utf32Be => 4,
            _ => 1,
        }
    }

    /// Longest encoded character.
    #[must_use]
    pub const fn max_char_len(self) -> usize {
        match self {
            Self::Binary | Self::UsAscii | Self::Latin1 => 1,
            _ => 4,
        }
    }

    /// True when ASCII text is encoded as itself.
    #[must_use]
    pub const fn is_ascii_compatible(self) -> bool {
        !matches!(
            self,
            Self::Utf16Le | Self::Utf16Be | Self::Utf32Le | Self::Utf32Be
        )
    }

    /// Decodes the character at the front of `bytes` (which must not be empty).
    #[must_use]
    pub fn scan(self, bytes: &[u8]) -> Scan {
        let Some(&first) = bytes.first() else {
            return Scan::Incomplete;
        };
        match self {
            Self::Binary | Self::Latin1 => Scan::Valid(char::from(first), 1),
            Self::UsAscii if first.is_ascii() => Scan::Valid(char::from(first), 1),
            Self::UsAscii => Scan::Invalid(1),
            Self::Utf8 => scan_utf8(bytes),
            Self::Utf16Le => scan_utf16(bytes, u16::from_le_bytes),
            Self::Utf16Be => scan_utf16(bytes, u16::from_be_bytes),
            Self::Utf32Le => scan_utf32(bytes, u32::from_le_bytes),
            Self::Utf32Be => scan_utf32(bytes, u32::from_be_bytes),
        }
    }

    /// Bytes still needed to complete the last character of `bytes`.
    ///
    /// Zero when `bytes` ends on a character boundary or when its tail can
    /// never become valid.
    #[must_use]
    pub fn incomplete_tail(self, bytes: &[u8]) -> usize {
        let n = bytes.len();
        match self {
            Self::Binary | Self::UsAscii | Self::Latin1 => 0,
            Self::Utf8 => {
                for back in 1..=n.min(4) {
                    let lead = bytes[n - back];
                    if lead & 0xC0 == 0x80 {
                        continue;
                    }
                    return match scan_utf8(&bytes[n - back..]) {
                        Scan::Incomplete => utf8_len(lead).saturating_sub(back),
                        _ => 0,
                    };
                }
                0
            }
            Self::Utf16Le | Self::Utf16Be => {
                let odd = n % 2;
                let aligned = n - odd;
                if aligned >= 2 {
                    let unit = [bytes[aligned - 2], bytes[aligned - 1]];
                    let unit = if self == Self::Utf16Le {
                        u16::from_le_bytes(unit)
                    } else {
                        u16::from_be_bytes(unit)
                    };
                    if (0xD800..=0xDBFF).contains(&unit) {
                        return 2 - odd;
                    }
                }
                odd
            }
            Self::Utf32Le | Self::Utf32Be => (4 - n % 4) % 4,
        }
    }

    /// Appends `ch` in this encoding. Returns `false` when the encoding
    /// cannot represent it.
    pub fn encode(self, ch: char, out: &mut Vec<u8>) -> bool {
        let code = u32::from(ch);
        match self {
            Self::UsAscii if code < 0x80 => out.push(code as u8),
            Self::Binary | Self::Latin1 if code < 0x100 => out.push(code as u8),
            Self::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            Self::Utf16Le | Self::Utf16Be => {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf) {
                    let bytes = if self == Self::Utf16Le {
                        unit.to_le_bytes()
                    } else {
                        unit.to_be_bytes()
                    };
                    out.extend_from_slice(&bytes);
                }
            }
            Self::Utf32Le => out.extend_from_slice(&code.to_le_bytes()),
            Self::Utf32Be => out.extend_from_slice(&code.to_be_bytes()),
            _ => return false,
        }
        true
    }

    /// Re-encodes ASCII `text` into this encoding.
    ///
    /// Used for separators, which callers give as ASCII-compatible bytes.
    /// Fails when `text` holds non-ASCII bytes and this encoding is not
    /// ASCII-compatible.
    pub fn encode_ascii(self, text: &[u8]) -> Result<Vec<u8>> {
        if self.is_ascii_compatible() {
            return Ok(text.to_vec());
        }
        if !text.is_ascii() {
            return Err(StreamError::EncodingMismatch(format!(
                "non-ASCII separator is incompatible with {}",
                self.name()
            )));
        }
        let mut out = Vec::with_capacity(text.len() * self.unit_len());
        for &b in text {
            self.encode(char::from(b), &mut out);
        }
        Ok(out)
    }

    /// The newline character in this encoding.
    #[must_use]
    pub fn newline(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.unit_len());
        self.encode('\n', &mut out);
        out
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = StreamError;

    /// Case-insensitive; accepts common aliases.
    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        let enc = match norm.as_str() {
            "ascii-8bit" | "binary" => Self::Binary,
            "us-ascii" | "ascii" => Self::UsAscii,
            "utf-8" | "utf8" => Self::Utf8,
            "utf-16le" | "utf16le" => Self::Utf16Le,
            "utf-16be" | "utf16be" => Self::Utf16Be,
            "utf-32le" | "utf32le" => Self::Utf32Le,
            "utf-32be" | "utf32be" => Self::Utf32Be,
            "iso-8859-1" | "iso8859-1" | "latin1" => Self::Latin1,
            _ => {
                return Err(StreamError::InvalidArgument(format!(
                    "unknown encoding: {s}"
                )));
            }
        };
        Ok(enc)
    }
}

/// Parsed `"[BOM|]external[:internal]"` encoding string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSpec {
    pub bom: bool,
    pub external: Encoding,
    pub internal: Option<Encoding>,
}

impl FromStr for EncodingSpec {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (bom, rest) = match s.split_once('|') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("bom") => (true, rest),
            Some(_) => {
                return Err(StreamError::InvalidArgument(format!(
                    "bad encoding prefix in {s:?}"
                )));
            }
            None => (false, s),
        };
        let (external, internal) = match rest.split_once(':') {
            Some((ext, "-")) => (ext.parse()?, None),
            Some((ext, int)) => (ext.parse()?, Some(int.parse()?)),
            None => (rest.parse()?, None),
        };
        Ok(Self {
            bom,
            external,
            internal,
        })
    }
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

fn scan_utf8(bytes: &[u8]) -> Scan {
    let lead = bytes[0];
    if lead.is_ascii() {
        return Scan::Valid(char::from(lead), 1);
    }
    let len = utf8_len(lead);
    if len == 1 {
        return Scan::Invalid(1);
    }
    let second = match lead {
        0xE0 => 0xA0..=0xBF,
        0xED => 0x80..=0x9F,
        0xF0 => 0x90..=0xBF,
        0xF4 => 0x80..=0x8F,
        _ => 0x80..=0xBF,
    };
    for i in 1..len {
        let Some(&b) = bytes.get(i) else {
            return Scan::Incomplete;
        };
        let ok = if i == 1 {
            second.contains(&b)
        } else {
            (0x80..=0xBF).contains(&b)
        };
        if !ok {
            return Scan::Invalid(i);
        }
    }
    match std::str::from_utf8(&bytes[..len]).ok().and_then(|s| s.chars().next()) {
        Some(ch) => Scan::Valid(ch, len),
        None => Scan::Invalid(1),
    }
}

fn scan_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Scan {
    if bytes.len() < 2 {
        return Scan::Incomplete;
    }
    let hi = unit([bytes[0], bytes[1]]);
    match hi {
        0xD800..=0xDBFF => {
            if bytes.len() < 4 {
                return Scan::Incomplete;
            }
            let lo = unit([bytes[2], bytes[3]]);
            if !(0xDC00..=0xDFFF).contains(&lo) {
                return Scan::Invalid(2);
            }
            let code = 0x10000 + ((u32::from(hi) - 0xD800) << 10) + (u32::from(lo) - 0xDC00);
            char::from_u32(code).map_or(Scan::Invalid(4), |ch| Scan::Valid(ch, 4))
        }
        0xDC00..=0xDFFF => Scan::Invalid(2),
        _ => char::from_u32(u32::from(hi)).map_or(Scan::Invalid(2), |ch| Scan::Valid(ch, 2)),
    }
}

fn scan_utf32(bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Scan {
    if bytes.len() < 4 {
        return Scan::Incomplete;
    }
    let code = unit([bytes[0], bytes[1], bytes[2], bytes[3]]);
    char::from_u32(code).map_or(Scan::Invalid(4), |ch| Scan::Valid(ch, 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("utf-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("UTF_16BE".parse::<Encoding>().unwrap(), Encoding::Utf16Be);
        assert_eq!("ASCII-8BIT".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert_eq!("latin1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("ebcdic".parse::<Encoding>().is_err());
        assert_eq!(Encoding::Utf32Le.to_string(), "UTF-32LE");
    }

    #[test]
    fn spec_strings() {
        let spec: EncodingSpec = "BOM|utf-8".parse().unwrap();
        assert!(spec.bom);
        assert_eq!(spec.external, Encoding::Utf8);
        let spec: EncodingSpec = "utf-16le:utf-8".parse().unwrap();
        assert_eq!(spec.internal, Some(Encoding::Utf8));
        let spec: EncodingSpec = "latin1:-".parse().unwrap();
        assert_eq!(spec.internal, None);
        assert!("xx|utf-8".parse::<EncodingSpec>().is_err());
    }

    #[test]
    fn scan_utf8_boundaries() {
        let e = Encoding::Utf8;
        assert_eq!(e.scan(b"a"), Scan::Valid('a', 1));
        assert_eq!(e.scan("é".as_bytes()), Scan::Valid('é', 2));
        assert_eq!(e.scan("€x".as_bytes()), Scan::Valid('€', 3));
        assert_eq!(e.scan(&[0xE2, 0x82]), Scan::Incomplete);
        assert_eq!(e.scan(&[0xE2, 0x41]), Scan::Invalid(1));
        assert_eq!(e.scan(&[0xFF]), Scan::Invalid(1));
        assert_eq!(e.scan(&[0xED, 0xA0, 0x80]), Scan::Invalid(1));
    }

    #[test]
    fn scan_utf16_surrogates() {
        let e = Encoding::Utf16Le;
        assert_eq!(e.scan(&[0x41, 0x00]), Scan::Valid('A', 2));
        assert_eq!(e.scan(&[0x3D, 0xD8]), Scan::Incomplete);
        assert_eq!(e.scan(&[0x3D, 0xD8, 0x00, 0xDE]), Scan::Valid('😀', 4));
        assert_eq!(e.scan(&[0x00, 0xDE]), Scan::Invalid(2));
        assert_eq!(Encoding::Utf16Be.scan(&[0x00, 0x41]), Scan::Valid('A', 2));
    }

    #[test]
    fn incomplete_tails() {
        assert_eq!(Encoding::Utf8.incomplete_tail(b"ab"), 0);
        assert_eq!(Encoding::Utf8.incomplete_tail(&[b'a', 0xE2]), 2);
        assert_eq!(Encoding::Utf8.incomplete_tail(&[b'a', 0xE2, 0x82]), 1);
        assert_eq!(Encoding::Utf8.incomplete_tail(&[0xE2, 0x82, 0xAC]), 0);
        assert_eq!(Encoding::Utf16Le.incomplete_tail(&[0x41]), 1);
        assert_eq!(Encoding::Utf16Le.incomplete_tail(&[0x3D, 0xD8]), 2);
        assert_eq!(Encoding::Utf16Le.incomplete_tail(&[0x3D, 0xD8, 0x00]), 1);
        assert_eq!(Encoding::Utf32Be.incomplete_tail(&[0, 0, 0]), 1);
        assert_eq!(Encoding::Latin1.incomplete_tail(&[0xE9]), 0);
    }

    #[test]
    fn encode_reports_unrepresentable() {
        let mut out = Vec::new();
        assert!(Encoding::Latin1.encode('é', &mut out));
        assert_eq!(out, [0xE9]);
        assert!(!Encoding::UsAscii.encode('é', &mut out));
        assert!(!Encoding::Latin1.encode('€', &mut out));
        out.clear();
        assert!(Encoding::Utf16Be.encode('😀', &mut out));
        assert_eq!(out, [0xD8, 0x3D, 0xDE, 0x00]);
    }

    #[test]
    fn ascii_separators() {
        assert_eq!(Encoding::Utf16Le.encode_ascii(b"\n").unwrap(), [0x0A, 0x00]);
        assert_eq!(Encoding::Utf32Be.newline(), [0, 0, 0, 0x0A]);
        assert_eq!(Encoding::Utf8.encode_ascii("é".as_bytes()).unwrap(), "é".as_bytes());
        assert!(matches!(
            Encoding::Utf16Le.encode_ascii("é".as_bytes()),
            Err(StreamError::EncodingMismatch(_))
        ));
    }
}
