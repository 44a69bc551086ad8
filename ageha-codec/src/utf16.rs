use byteorder::{ByteOrder, LittleEndian};

/// Decodes UTF-16LE bytes to a string, stopping at the first null code unit.
/// Unpaired surrogates become U+FFFD.
pub fn decode_utf16le(data: &[u8]) -> String {
    let mut units = Vec::with_capacity(data.len() / 2);
    for chunk in data.chunks_exact(2) {
        let unit = LittleEndian::read_u16(chunk);
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encodes a string as UTF-16LE without a terminator.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Encodes a string into a fixed-width zero-padded UTF-16LE field. Text that
/// does not fit is truncated at a code-unit boundary.
pub fn encode_utf16le_padded(text: &str, size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    for (i, unit) in text.encode_utf16().enumerate() {
        if i * 2 + 1 >= size {
            break;
        }
        LittleEndian::write_u16(&mut buf[i * 2..], unit);
    }
    buf
}

/// Reads a null-terminated UTF-16LE string out of a fixed-width field.
pub fn read_utf16le_field(data: &[u8], offset: usize, size: usize) -> String {
    if offset >= data.len() {
        return String::new();
    }
    let end = (offset + size).min(data.len());
    decode_utf16le(&data[offset..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_null() {
        let bytes = [b'S', 0, b'5', 0, 0, 0, b'X', 0];
        assert_eq!(decode_utf16le(&bytes), "S5");
    }

    #[test]
    fn padded_field_round_trip() {
        let field = encode_utf16le_padded("DATA1.ALF", 0x200);
        assert_eq!(field.len(), 0x200);
        assert_eq!(read_utf16le_field(&field, 0, 0x200), "DATA1.ALF");
    }

    #[test]
    fn non_bmp_chars_use_surrogate_pairs() {
        let text = "a\u{1F600}b";
        let bytes = encode_utf16le(text);
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode_utf16le(&bytes), text);
    }
}
