//! Character and line extraction over a pull-based byte [`Source`].
//!
//! The splitter accumulates into the output line and searches the
//! accumulated bytes, so separators (including the double newline of
//! paragraph mode) may straddle any number of source chunks.

use crate::encoding::{Encoding, Scan};
use crate::error::{Result, StreamError};
use crate::transport::Io;

/// Line separator used by `gets` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    /// Literal separator bytes, given in an ASCII-compatible encoding.
    Bytes(Vec<u8>),
    /// Paragraph mode: lines end at a run of two or more newlines.
    Paragraph,
    /// No separator: read to the end (or to the limit).
    None,
}

impl Default for Separator {
    fn default() -> Self {
        Self::Bytes(b"\n".to_vec())
    }
}

impl Separator {
    /// Separator from raw bytes; empty bytes select paragraph mode.
    pub fn bytes(sep: impl Into<Vec<u8>>) -> Self {
        let sep = sep.into();
        if sep.is_empty() {
            Self::Paragraph
        } else {
            Self::Bytes(sep)
        }
    }
}

impl From<&str> for Separator {
    fn from(sep: &str) -> Self {
        Self::bytes(sep.as_bytes())
    }
}

/// Options for one line read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOptions {
    /// `None` uses the stream's configured input separator.
    pub separator: Option<Separator>,
    /// Maximum bytes per line, extended to the next character boundary.
    pub limit: Option<usize>,
    /// Strip the separator from the returned line.
    pub chomp: bool,
}

impl LineOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn separator(mut self, separator: impl Into<Separator>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    #[must_use]
    pub fn paragraph(mut self) -> Self {
        self.separator = Some(Separator::Paragraph);
        self
    }

    #[must_use]
    pub fn whole(mut self) -> Self {
        self.separator = Some(Separator::None);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn chomp(mut self, chomp: bool) -> Self {
        self.chomp = chomp;
        self
    }
}

/// A separator resolved against the encoding of the bytes being split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delimiter {
    All,
    Bytes { sep: Vec<u8>, newline_default: bool },
    Paragraph { newline: Vec<u8> },
}

impl Delimiter {
    pub(crate) fn resolve(separator: &Separator, enc: Encoding) -> Result<Self> {
        Ok(match separator {
            Separator::None => Self::All,
            Separator::Paragraph => Self::Paragraph {
                newline: enc.newline(),
            },
            Separator::Bytes(sep) if sep.is_empty() => Self::Paragraph {
                newline: enc.newline(),
            },
            Separator::Bytes(sep) => Self::Bytes {
                sep: enc.encode_ascii(sep)?,
                newline_default: sep == b"\n",
            },
        })
    }
}

/// Pull-based byte source for the splitter.
pub(crate) trait Source {
    /// Non-empty buffered bytes, refilling when needed.
    fn fill_buf(&mut self) -> Result<Io<&[u8]>>;

    /// Marks `n` bytes of the last `fill_buf` consumed.
    fn consume(&mut self, n: usize);

    /// Pushes bytes back in front of the source.
    fn unread(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Takes up to `n` bytes, fewer only at end of stream.
fn take_up_to<S: Source + ?Sized>(src: &mut S, n: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        match src.fill_buf()? {
            Io::Ready(chunk) => {
                let k = (n - out.len()).min(chunk.len());
                out.extend_from_slice(&chunk[..k]);
                src.consume(k);
            }
            Io::Eof => break,
            Io::WouldBlock => {
                src.unread(&out)?;
                return Err(StreamError::WouldBlock);
            }
        }
    }
    Ok(out)
}

/// Looks at bytes one at a time while `more` accepts the bytes seen so far,
/// without consuming them. Never waits for a byte `more` does not ask for.
pub(crate) fn peek_while<S, F>(src: &mut S, mut more: F) -> Result<Vec<u8>>
where
    S: Source + ?Sized,
    F: FnMut(&[u8]) -> bool,
{
    let mut head = Vec::new();
    while more(&head) {
        let next = match src.fill_buf() {
            Ok(Io::Ready(chunk)) => Ok(chunk.first().copied()),
            Ok(Io::Eof) => Ok(None),
            Ok(Io::WouldBlock) => Err(StreamError::WouldBlock),
            Err(err) => Err(err),
        };
        match next {
            Ok(Some(byte)) => {
                src.consume(1);
                head.push(byte);
            }
            Ok(None) => break,
            Err(err) => {
                src.unread(&head)?;
                return Err(err);
            }
        }
    }
    src.unread(&head)?;
    Ok(head)
}

/// Reads one character; an incomplete sequence at end of stream or an
/// invalid sequence comes back as-is. `None` at end of stream.
pub(crate) fn read_char<S: Source + ?Sized>(
    src: &mut S,
    enc: Encoding,
) -> Result<Option<Vec<u8>>> {
    let max = enc.max_char_len();
    let mut acc: Vec<u8> = Vec::with_capacity(max);
    loop {
        let chunk = match src.fill_buf()? {
            Io::Ready(chunk) => chunk,
            Io::Eof => break,
            Io::WouldBlock => {
                src.unread(&acc)?;
                return Err(StreamError::WouldBlock);
            }
        };
        let held = acc.len();
        let take = (max - held).min(chunk.len());
        let mut candidate = acc.clone();
        candidate.extend_from_slice(&chunk[..take]);
        match enc.scan(&candidate) {
            Scan::Valid(_, n) | Scan::Invalid(n) => {
                if n > held {
                    src.consume(n - held);
                } else {
                    src.unread(&acc[n..])?;
                }
                candidate.truncate(n);
                return Ok(Some(candidate));
            }
            Scan::Incomplete => {
                src.consume(take);
                acc = candidate;
                if acc.len() >= max {
                    break;
                }
            }
        }
    }
    Ok((!acc.is_empty()).then_some(acc))
}

/// Extends `out` until it ends on a character boundary or the source ends.
fn complete_char<S: Source + ?Sized>(src: &mut S, out: &mut Vec<u8>, enc: Encoding) -> Result<()> {
    loop {
        let need = enc.incomplete_tail(out);
        if need == 0 {
            return Ok(());
        }
        let more = take_up_to(src, need)?;
        if more.is_empty() {
            return Ok(());
        }
        out.extend_from_slice(&more);
    }
}

/// Consumes a run of newlines. Returns `false` when the source ended.
fn skip_newlines<S: Source + ?Sized>(src: &mut S, newline: &[u8]) -> Result<bool> {
    loop {
        let candidate = take_up_to(src, newline.len())?;
        if candidate.is_empty() {
            return Ok(false);
        }
        if candidate != newline {
            src.unread(&candidate)?;
            return Ok(true);
        }
    }
}

/// First aligned occurrence of `sep` in `hay` starting at or after `from`;
/// returns the index just past it.
fn find_aligned(hay: &[u8], from: usize, sep: &[u8], unit: usize) -> Option<usize> {
    if hay.len() < sep.len() {
        return None;
    }
    if sep.len() == 1 && unit == 1 {
        return hay[from..]
            .iter()
            .position(|&b| b == sep[0])
            .map(|i| from + i + 1);
    }
    let start = from.div_ceil(unit) * unit;
    (start..=hay.len() - sep.len())
        .step_by(unit)
        .find(|&i| hay[i..].starts_with(sep))
        .map(|i| i + sep.len())
}

fn read_until<S: Source + ?Sized>(
    src: &mut S,
    sep: Option<&[u8]>,
    limit: Option<usize>,
    enc: Encoding,
) -> Result<Option<Vec<u8>>> {
    let mut out = Vec::new();
    let unit = enc.unit_len();
    loop {
        let room = limit.map_or(usize::MAX, |l| l.saturating_sub(out.len()));
        if room == 0 {
            complete_char(src, &mut out, enc)?;
            return Ok(Some(out));
        }
        let chunk = match src.fill_buf()? {
            Io::Ready(chunk) => chunk,
            Io::Eof => break,
            Io::WouldBlock => {
                src.unread(&out)?;
                return Err(StreamError::WouldBlock);
            }
        };
        let take = room.min(chunk.len());
        let before = out.len();
        out.extend_from_slice(&chunk[..take]);
        if let Some(sep) = sep {
            let from = before.saturating_sub(sep.len() - 1);
            if let Some(end) = find_aligned(&out, from, sep, unit) {
                src.consume(end - before);
                out.truncate(end);
                return Ok(Some(out));
            }
        }
        src.consume(take);
    }
    Ok((!out.is_empty()).then_some(out))
}

/// Reads one line. `None` at end of stream; `Some(vec![])` for a zero limit.
pub(crate) fn read_line<S: Source + ?Sized>(
    src: &mut S,
    delim: &Delimiter,
    limit: Option<usize>,
    enc: Encoding,
) -> Result<Option<Vec<u8>>> {
    if limit == Some(0) {
        return Ok(Some(Vec::new()));
    }
    match delim {
        Delimiter::All => read_until(src, None, limit, enc),
        Delimiter::Bytes { sep, .. } => read_until(src, Some(sep), limit, enc),
        Delimiter::Paragraph { newline } => {
            if !skip_newlines(src, newline)? {
                return Ok(None);
            }
            let mut double = newline.clone();
            double.extend_from_slice(newline);
            let line = read_until(src, Some(&double), limit, enc)?;
            if line.as_ref().is_some_and(|l| l.ends_with(&double)) {
                skip_newlines(src, newline)?;
            }
            Ok(line)
        }
    }
}

/// Strips the line terminator in place.
///
/// With the default `"\n"` separator a preceding `"\r"` goes too; in
/// paragraph mode every trailing newline is removed.
pub(crate) fn chomp(line: &mut Vec<u8>, delim: &Delimiter, enc: Encoding) {
    match delim {
        Delimiter::All => {}
        Delimiter::Bytes {
            sep,
            newline_default,
        } => {
            if line.ends_with(sep) {
                line.truncate(line.len() - sep.len());
                if *newline_default {
                    let mut cr = Vec::with_capacity(enc.unit_len());
                    enc.encode('\r', &mut cr);
                    if line.ends_with(&cr) {
                        line.truncate(line.len() - cr.len());
                    }
                }
            }
        }
        Delimiter::Paragraph { newline } => {
            while line.ends_with(newline) {
                line.truncate(line.len() - newline.len());
            }
        }
    }
}
