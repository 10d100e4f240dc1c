use super::{Encoding, Scan};

const REPLACEMENT: char = '\u{FFFD}';

/// Converts text between two encodings.
///
/// Undecodable input becomes U+FFFD in the target encoding, or `?` when
/// the target cannot represent U+FFFD; characters the target cannot
/// represent become `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    from: Encoding,
    to: Encoding,
}

impl Transcoder {
    /// `None` when no conversion is needed: identical encodings, or binary
    /// on either side.
    #[must_use]
    pub fn new(from: Encoding, to: Encoding) -> Option<Self> {
        if from == to || from == Encoding::Binary || to == Encoding::Binary {
            return None;
        }
        Some(Self { from, to })
    }

    #[must_use]
    pub const fn source(&self) -> Encoding {
        self.from
    }

    #[must_use]
    pub const fn target(&self) -> Encoding {
        self.to
    }

    /// The converter for the opposite direction.
    #[must_use]
    pub const fn reverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    /// Converts the complete characters of `input`, appending to `out`.
    ///
    /// Returns how many input bytes were used. Unless `finish` is set, a
    /// trailing incomplete sequence is left unused for the caller to carry
    /// into the next call; with `finish` it is replaced.
    pub fn convert(&self, input: &[u8], out: &mut Vec<u8>, finish: bool) -> usize {
        let mut i = 0;
        while i < input.len() {
            match self.from.scan(&input[i..]) {
                Scan::Valid(ch, n) => {
                    self.put(ch, out);
                    i += n;
                }
                Scan::Invalid(n) => {
                    self.put_replacement(out);
                    i += n;
                }
                Scan::Incomplete if finish => {
                    self.put_replacement(out);
                    i = input.len();
                }
                Scan::Incomplete => break,
            }
        }
        i
    }

    fn put(&self, ch: char, out: &mut Vec<u8>) {
        if !self.to.encode(ch, out) {
            self.to.encode('?', out);
        }
    }

    fn put_replacement(&self, out: &mut Vec<u8>) {
        self.put(REPLACEMENT, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_converter_for_identity_or_binary() {
        assert!(Transcoder::new(Encoding::Utf8, Encoding::Utf8).is_none());
        assert!(Transcoder::new(Encoding::Binary, Encoding::Utf8).is_none());
        assert!(Transcoder::new(Encoding::Utf8, Encoding::Binary).is_none());
    }

    #[test]
    fn utf16_to_utf8() {
        let t = Transcoder::new(Encoding::Utf16Le, Encoding::Utf8).unwrap();
        let mut out = Vec::new();
        let used = t.convert(&[0x68, 0x00, 0xE9, 0x00], &mut out, false);
        assert_eq!(used, 4);
        assert_eq!(out, "hé".as_bytes());
    }

    #[test]
    fn incomplete_tail_is_carried() {
        let t = Transcoder::new(Encoding::Utf8, Encoding::Utf16Be).unwrap();
        let mut out = Vec::new();
        let input = [b'a', 0xE2, 0x82];
        assert_eq!(t.convert(&input, &mut out, false), 1);
        assert_eq!(out, [0x00, b'a']);
        out.clear();
        assert_eq!(t.convert(&[0xE2, 0x82, 0xAC], &mut out, false), 3);
        assert_eq!(out, [0x20, 0xAC]);
    }

    #[test]
    fn finish_replaces_incomplete() {
        let t = Transcoder::new(Encoding::Utf8, Encoding::Utf16Le).unwrap();
        let mut out = Vec::new();
        assert_eq!(t.convert(&[0xE2, 0x82], &mut out, true), 2);
        assert_eq!(out, [0xFD, 0xFF]);
    }

    #[test]
    fn unrepresentable_becomes_question_mark() {
        let t = Transcoder::new(Encoding::Utf8, Encoding::Latin1).unwrap();
        let mut out = Vec::new();
        t.convert("é€".as_bytes(), &mut out, true);
        assert_eq!(out, [0xE9, b'?']);
        out.clear();
        t.convert(&[0xFF], &mut out, true);
        assert_eq!(out, [b'?']);
    }

    #[test]
    fn reverse_swaps_direction() {
        let t = Transcoder::new(Encoding::Latin1, Encoding::Utf8).unwrap();
        assert_eq!(t.reverse().source(), Encoding::Utf8);
        assert_eq!(t.reverse().target(), Encoding::Latin1);
    }
}
