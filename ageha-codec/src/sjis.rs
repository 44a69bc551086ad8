use encoding_rs::SHIFT_JIS;

/// Decodes Shift-JIS bytes to a string. Byte sequences the codec rejects are
/// mapped one byte per char so the caller can carry them through unchanged.
pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let (text, _, failure) = SHIFT_JIS.decode(bytes);
    if failure {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        text.into_owned()
    }
}

/// Encodes a string as Shift-JIS. The inverse of the decode fallback: chars
/// in the Latin-1 range are written as single bytes when the codec cannot
/// represent the text.
pub fn encode_shift_jis(text: &str) -> Vec<u8> {
    let (bytes, _, failure) = SHIFT_JIS.encode(text);
    if failure {
        text.chars().map(|c| (c as u32) as u8).collect()
    } else {
        bytes.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        assert_eq!(decode_shift_jis(b"hello"), "hello");
        assert_eq!(encode_shift_jis("hello"), b"hello");
    }

    #[test]
    fn japanese_round_trip() {
        let text = "\u{65E5}\u{672C}\u{8A9E}"; // 日本語
        let bytes = encode_shift_jis(text);
        assert_eq!(bytes, [0x93, 0xFA, 0x96, 0x7B, 0x8C, 0xEA]);
        assert_eq!(decode_shift_jis(&bytes), text);
    }

    #[test]
    fn undecodable_bytes_survive() {
        // 0x81 starts a double-byte sequence but 0x20 is not a valid trail.
        let bytes = [0x41, 0x81, 0x20, 0x42];
        let text = decode_shift_jis(&bytes);
        assert_eq!(encode_shift_jis(&text), bytes);
    }
}
