//! Text encoding detection with a fixed fallback.
//!
//! Encoding is guessed statistically from a bounded prefix of the file.
//! The guess is verified by decoding that same prefix; if it produces
//! replacement characters the prefix is re-checked exactly once against
//! windows-1252 before the item is given up on. The rest of the file is
//! never decoded here: callers stream it through the chosen encoding.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::debug;

use crate::error::{DecodeExhaustedSnafu, ReaderError};

/// Bytes sampled for statistical encoding detection.
pub const SNIFF_LEN: usize = 1000;

/// Guess the encoding of a byte stream from its first [`SNIFF_LEN`] bytes.
///
/// The sample is fed as a non-final chunk: a multibyte sequence truncated
/// at the window boundary stays pending instead of counting against the
/// guessed encoding.
pub fn sniff(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    let sample = &bytes[..bytes.len().min(SNIFF_LEN)];
    detector.feed(sample, false);
    detector.guess(None, true)
}

/// Choose the encoding for a file from its sniffed prefix, falling back to
/// windows-1252 when the guess decodes the prefix lossily.
pub fn select_encoding(prefix: &[u8], path: &str) -> Result<&'static Encoding, ReaderError> {
    let detected = sniff(prefix);
    if decodes_cleanly(detected, prefix) {
        return Ok(detected);
    }

    debug!(
        "Prefix of {} is lossy as {}, retrying with {}",
        path,
        detected.name(),
        WINDOWS_1252.name()
    );
    if decodes_cleanly(WINDOWS_1252, prefix) {
        return Ok(WINDOWS_1252);
    }
    DecodeExhaustedSnafu {
        path,
        detected: detected.name(),
    }
    .fail()
}

/// Whether the prefix decodes without replacement characters. A multibyte
/// sequence cut off at the prefix boundary is left pending, not counted as
/// an error.
fn decodes_cleanly(encoding: &'static Encoding, prefix: &[u8]) -> bool {
    let mut decoder = encoding.new_decoder();
    let capacity = decoder
        .max_utf8_buffer_length(prefix.len())
        .unwrap_or(prefix.len() * 4 + 4);
    let mut out = String::with_capacity(capacity);
    let (_, _, had_errors) = decoder.decode_to_string(prefix, &mut out, false);
    !had_errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_utf8() {
        let text = "name,email\nИван Петров,ivan@example.com\n";
        assert_eq!(sniff(text.as_bytes()), encoding_rs::UTF_8);
    }

    #[test]
    fn test_select_clean_utf8() {
        let text = "col_a,col_b\nПётр,x\n";
        let encoding = select_encoding(text.as_bytes(), "test.csv").unwrap();
        assert_eq!(encoding, encoding_rs::UTF_8);
    }

    #[test]
    fn test_select_handles_legacy_byte() {
        // 0xE9 is 'é' in windows-1252 but invalid as a lone UTF-8 byte
        let prefix = b"name\ncaf\xe9\n";
        let encoding = select_encoding(prefix, "legacy.csv").unwrap();
        let (decoded, _, had_errors) = encoding.decode(prefix);
        assert!(!had_errors);
        assert!(decoded.contains("café"));
    }

    #[test]
    fn test_truncated_multibyte_at_boundary_is_not_an_error() {
        // A prefix ending mid-way through a two-byte UTF-8 sequence
        let mut prefix = "col\nзначение".as_bytes().to_vec();
        prefix.pop();
        let encoding = select_encoding(&prefix, "cut.csv").unwrap();
        assert_eq!(encoding, encoding_rs::UTF_8);
    }
}
