//! Encoding detection and per-line decoding.
//!
//! Detection looks at a leading sample only. A byte-order marker wins; without
//! one, a zero-byte parity count separates UTF-16 from UTF-8: ASCII-heavy
//! UTF-16LE text has a zero in almost every odd position, UTF-16BE in almost
//! every even one.

use std::borrow::Cow;

/// Bytes inspected by [`detect`] when classifying a file.
pub const SAMPLE_LEN: usize = 4096;

/// Share of zero bytes (per parity) above which a sample is classified UTF-16.
const ZERO_PARITY_THRESHOLD: f64 = 0.4;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text encodings the line index can scan and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-8 with a leading byte-order marker.
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf8Bom => "UTF-8 BOM",
            Self::Utf16Le => "UTF-16 LE",
            Self::Utf16Be => "UTF-16 BE",
        }
    }

    pub fn is_utf16(&self) -> bool {
        matches!(self, Self::Utf16Le | Self::Utf16Be)
    }

    /// Byte sequence terminating a line in this encoding.
    pub fn newline(&self) -> &'static [u8] {
        match self {
            Self::Utf8 | Self::Utf8Bom => b"\n",
            Self::Utf16Le => b"\n\x00",
            Self::Utf16Be => b"\x00\n",
        }
    }

    /// Length of the byte-order marker `bytes` starts with, if it matches this encoding.
    pub fn bom_len(&self, bytes: &[u8]) -> usize {
        let bom = match self {
            Self::Utf8 => return 0,
            Self::Utf8Bom => UTF8_BOM,
            Self::Utf16Le => UTF16LE_BOM,
            Self::Utf16Be => UTF16BE_BOM,
        };
        if bytes.starts_with(bom) { bom.len() } else { 0 }
    }

    fn to_encoding_rs(self) -> &'static encoding_rs::Encoding {
        match self {
            Self::Utf8 | Self::Utf8Bom => encoding_rs::UTF_8,
            Self::Utf16Le => encoding_rs::UTF_16LE,
            Self::Utf16Be => encoding_rs::UTF_16BE,
        }
    }

    /// Decode a raw line slice. Malformed sequences become U+FFFD; a
    /// byte-order marker inside the slice is kept as text, callers strip it.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _had_errors) = self.to_encoding_rs().decode_without_bom_handling(bytes);
        text
    }
}

/// Classify `sample` (normally the first [`SAMPLE_LEN`] bytes of a file).
pub fn detect(sample: &[u8]) -> Encoding {
    let sample = &sample[..sample.len().min(SAMPLE_LEN)];
    if sample.starts_with(UTF16LE_BOM) {
        return Encoding::Utf16Le;
    }
    if sample.starts_with(UTF16BE_BOM) {
        return Encoding::Utf16Be;
    }
    if sample.starts_with(UTF8_BOM) {
        return Encoding::Utf8Bom;
    }
    if sample.len() < 4 {
        return Encoding::Utf8;
    }

    let pairs = sample.len() as f64 / 2.0;
    let zeros_odd = sample.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
    if zeros_odd as f64 / pairs > ZERO_PARITY_THRESHOLD {
        return Encoding::Utf16Le;
    }
    let zeros_even = sample.iter().step_by(2).filter(|b| **b == 0).count();
    if zeros_even as f64 / pairs > ZERO_PARITY_THRESHOLD {
        return Encoding::Utf16Be;
    }
    Encoding::Utf8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn bom_markers_win() {
        assert_eq!(detect(&[0xFF, 0xFE, b'a', 0]), Encoding::Utf16Le);
        assert_eq!(detect(&[0xFE, 0xFF, 0, b'a']), Encoding::Utf16Be);
        assert_eq!(detect(&[0xEF, 0xBB, 0xBF, b'a', b'b']), Encoding::Utf8Bom);
    }

    #[test]
    fn bare_ff_fe_is_little_endian() {
        assert_eq!(detect(&[0xFF, 0xFE]), Encoding::Utf16Le);
    }

    #[test]
    fn zero_parity_heuristic() {
        assert_eq!(detect(&utf16le("hello world\n")), Encoding::Utf16Le);
        assert_eq!(detect(&utf16be("hello world\n")), Encoding::Utf16Be);
        assert_eq!(detect(b"hello world\n"), Encoding::Utf8);
    }

    #[test]
    fn short_sample_defaults_to_utf8() {
        assert_eq!(detect(b""), Encoding::Utf8);
        assert_eq!(detect(&[b'a', 0]), Encoding::Utf8);
    }

    #[test]
    fn decode_replaces_malformed_bytes() {
        let text = Encoding::Utf8.decode(b"ok\xFFok");
        assert_eq!(text, "ok\u{FFFD}ok");
        let odd = Encoding::Utf16Le.decode(&[b'a', 0, b'b']);
        assert!(odd.starts_with('a'));
        assert!(odd.ends_with('\u{FFFD}'));
    }

    #[test]
    fn newline_markers_follow_byte_order() {
        assert_eq!(Encoding::Utf16Le.newline(), &[0x0A, 0x00]);
        assert_eq!(Encoding::Utf16Be.newline(), &[0x00, 0x0A]);
        assert_eq!(Encoding::Utf8Bom.newline(), b"\n");
    }
}
