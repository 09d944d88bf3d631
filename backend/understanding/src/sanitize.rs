//! Text clean-up for model output.

use std::borrow::Cow;

/// Character substituted for undecodable bytes.
pub const DEFAULT_PLACEHOLDER: char = '\'';

/// Decode a response body, turning invalid UTF-8 sequences into U+FFFD.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Replace every U+FFFD in `text` with `placeholder`.
pub fn sanitize_text(text: &str, placeholder: char) -> String {
    if !text.contains(char::REPLACEMENT_CHARACTER) {
        return text.to_string();
    }
    text.chars()
        .map(|c| if c == char::REPLACEMENT_CHARACTER { placeholder } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bytes_become_placeholder() {
        let bytes = b"don\xE2\x80t stop";
        let decoded = decode_lossy(bytes);
        assert!(decoded.contains(char::REPLACEMENT_CHARACTER));
        assert_eq!(sanitize_text(&decoded, DEFAULT_PLACEHOLDER), "don't stop");
    }

    #[test]
    fn clean_text_is_untouched() {
        assert_eq!(sanitize_text("plain ascii", '?'), "plain ascii");
    }
}
