use super::Encoding;

/// Byte-order marks, longest candidates for a shared prefix first.
const BOMS: [(&[u8], Encoding); 5] = [
    (&[0xEF, 0xBB, 0xBF], Encoding::Utf8),
    (&[0xFF, 0xFE, 0x00, 0x00], Encoding::Utf32Le),
    (&[0xFF, 0xFE], Encoding::Utf16Le),
    (&[0xFE, 0xFF], Encoding::Utf16Be),
    (&[0x00, 0x00, 0xFE, 0xFF], Encoding::Utf32Be),
];

/// Recognizes a byte-order mark at the start of `head`.
///
/// `head` should hold the first four bytes of the stream, or all of them
/// when the stream is shorter. Returns the encoding and the mark's length.
#[must_use]
pub fn detect_bom(head: &[u8]) -> Option<(Encoding, usize)> {
    BOMS.iter()
        .find(|(mark, _)| head.starts_with(mark))
        .map(|&(mark, enc)| (enc, mark.len()))
}

/// True while a mark longer than `head` still starts with it, so another
/// byte is needed before [`detect_bom`] can decide.
#[must_use]
pub fn bom_may_extend(head: &[u8]) -> bool {
    BOMS.iter()
        .any(|(mark, _)| mark.len() > head.len() && mark.starts_with(head))
}
