//! Character layer.
//!
//! Sits between the byte buffers and the façade. When a pipeline converts
//! between an external and an internal encoding, [`CharLayer`] holds the
//! converted characters not yet handed out, the tail of an incomplete
//! external sequence waiting for more bytes, and the tail of an incomplete
//! internal sequence waiting to be written.

mod line;

pub use line::{LineOptions, Separator};

pub(crate) use line::{Delimiter, Source, chomp, peek_while, read_char, read_line};

use crate::encoding::Transcoder;

/// Decode and encode queues for one pipeline.
#[derive(Debug, Default)]
pub struct CharLayer {
    decoded: Vec<u8>,
    pos: usize,
    carry: Vec<u8>,
    write_carry: Vec<u8>,
}

impl CharLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converted characters not yet consumed.
    pub fn pending(&self) -> &[u8] {
        &self.decoded[self.pos..]
    }

    /// True when characters or an incomplete sequence are held on the read
    /// side; byte-granularity reads must not bypass them.
    pub fn has_pending(&self) -> bool {
        self.pos < self.decoded.len() || !self.carry.is_empty()
    }

    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.decoded.len());
        if self.pos == self.decoded.len() {
            self.decoded.clear();
            self.pos = 0;
        }
    }

    /// Removes and returns up to `n` converted bytes.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.decoded.len() - self.pos);
        let out = self.decoded[self.pos..self.pos + n].to_vec();
        self.consume(n);
        out
    }

    /// Pushes characters back in front of the decode queue.
    pub fn unread(&mut self, bytes: &[u8]) {
        if self.pos >= bytes.len() {
            self.pos -= bytes.len();
            self.decoded[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        } else {
            let rest = self.decoded.split_off(self.pos);
            self.decoded.clear();
            self.decoded.extend_from_slice(bytes);
            self.decoded.extend_from_slice(&rest);
            self.pos = 0;
        }
    }

    /// Converts external bytes, keeping an incomplete tail for the next call.
    pub fn decode(&mut self, conv: &Transcoder, input: &[u8]) {
        if self.pos == self.decoded.len() {
            self.decoded.clear();
            self.pos = 0;
        }
        if self.carry.is_empty() {
            let used = conv.convert(input, &mut self.decoded, false);
            self.carry.extend_from_slice(&input[used..]);
        } else {
            let mut joined = std::mem::take(&mut self.carry);
            joined.extend_from_slice(input);
            let used = conv.convert(&joined, &mut self.decoded, false);
            self.carry.extend_from_slice(&joined[used..]);
        }
    }

    /// Flushes the carried tail at end of stream (it becomes a replacement
    /// character).
    pub fn finish(&mut self, conv: &Transcoder) {
        if !self.carry.is_empty() {
            let carry = std::mem::take(&mut self.carry);
            conv.convert(&carry, &mut self.decoded, true);
        }
    }

    /// Drops every read-side character and partial sequence, returning the
    /// number of converted bytes dropped.
    pub fn discard(&mut self) -> usize {
        let n = self.decoded.len() - self.pos;
        self.decoded.clear();
        self.pos = 0;
        self.carry.clear();
        n
    }

    /// Converts caller bytes for the transport, holding back an incomplete
    /// trailing sequence until the next write.
    pub fn encode(&mut self, conv: &Transcoder, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut joined = std::mem::take(&mut self.write_carry);
        joined.extend_from_slice(data);
        let used = conv.convert(&joined, &mut out, false);
        self.write_carry.extend_from_slice(&joined[used..]);
        out
    }

    /// Converts whatever incomplete sequence is held on the write side.
    pub fn finish_write(&mut self, conv: &Transcoder) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.write_carry.is_empty() {
            let carry = std::mem::take(&mut self.write_carry);
            conv.convert(&carry, &mut out, true);
        }
        out
    }

    pub fn has_write_carry(&self) -> bool {
        !self.write_carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn decode_carries_split_sequences() {
        let conv = Transcoder::new(Encoding::Utf8, Encoding::Utf16Le).unwrap();
        let mut layer = CharLayer::new();
        let euro = "€".as_bytes();
        layer.decode(&conv, &[b'a', euro[0]]);
        assert_eq!(layer.pending(), [b'a', 0]);
        assert!(layer.has_pending());
        layer.consume(2);
        assert!(layer.has_pending());
        layer.decode(&conv, &euro[1..]);
        assert_eq!(layer.pending(), [0xAC, 0x20]);
    }

    #[test]
    fn finish_replaces_truncated_tail() {
        let conv = Transcoder::new(Encoding::Utf8, Encoding::Latin1).unwrap();
        let mut layer = CharLayer::new();
        layer.decode(&conv, &[0xC3]);
        assert!(layer.pending().is_empty());
        layer.finish(&conv);
        assert_eq!(layer.pending(), b"?");
    }

    #[test]
    fn unread_prepends() {
        let conv = Transcoder::new(Encoding::Latin1, Encoding::Utf8).unwrap();
        let mut layer = CharLayer::new();
        layer.decode(&conv, b"bc");
        layer.unread(b"a");
        assert_eq!(layer.take(3), b"abc");
        layer.unread("é".as_bytes());
        assert_eq!(layer.pending(), "é".as_bytes());
        assert_eq!(layer.discard(), 2);
        assert!(!layer.has_pending());
    }

    #[test]
    fn encode_holds_incomplete_write() {
        let conv = Transcoder::new(Encoding::Utf8, Encoding::Utf16Be).unwrap();
        let mut layer = CharLayer::new();
        let e = "é".as_bytes();
        assert_eq!(layer.encode(&conv, &[b'x', e[0]]), [0, b'x']);
        assert!(layer.has_write_carry());
        assert_eq!(layer.encode(&conv, &e[1..]), [0x00, 0xE9]);
        assert!(layer.finish_write(&conv).is_empty());
    }
}
