use ageha_codec::{decode_shift_jis, encode_shift_jis};
use byteorder::{ByteOrder, LittleEndian};

use crate::{Dialect, ScriptError};

/// Decodes an obfuscated string from the footer. SYS5 strings are UTF-16LE
/// code units XOR'd with 0xFFFF (terminator stored as 0xFFFF); SYS4 strings
/// are Shift-JIS bytes XOR'd with 0xFF (terminator stored as 0xFF).
pub fn decode_text(data: &[u8], offset: usize, dialect: Dialect) -> Result<String, ScriptError> {
    if offset >= data.len() {
        return Err(ScriptError::UnexpectedEof { offset });
    }

    match dialect {
        Dialect::Sys5 => {
            let mut units = Vec::new();
            let mut pos = offset;
            while pos + 1 < data.len() {
                let unit = LittleEndian::read_u16(&data[pos..]);
                if unit == 0xFFFF {
                    break;
                }
                units.push(unit ^ 0xFFFF);
                pos += 2;
            }
            Ok(char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect())
        }
        Dialect::Sys4 => {
            let mut bytes = Vec::new();
            for &b in &data[offset..] {
                if b == 0xFF {
                    break;
                }
                bytes.push(b ^ 0xFF);
            }
            Ok(decode_shift_jis(&bytes))
        }
    }
}

/// Encodes a string into its obfuscated wire form, terminator included.
pub fn encode_text(text: &str, dialect: Dialect) -> Vec<u8> {
    match dialect {
        Dialect::Sys5 => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            for c in text.chars() {
                let unit = (c as u32 as u16) ^ 0xFFFF;
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out.extend_from_slice(&[0xFF, 0xFF]);
            out
        }
        Dialect::Sys4 => {
            let sjis = encode_shift_jis(text);
            let mut out: Vec<u8> = sjis.iter().map(|b| b ^ 0xFF).collect();
            out.push(0xFF);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys5_text_round_trip() {
        let encoded = encode_text("abc", Dialect::Sys5);
        assert_eq!(
            encoded,
            vec![0x9E, 0xFF, 0x9D, 0xFF, 0x9C, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(decode_text(&encoded, 0, Dialect::Sys5).unwrap(), "abc");
    }

    #[test]
    fn sys4_text_round_trip() {
        let text = "\u{30C6}\u{30B9}\u{30C8}"; // テスト
        let encoded = encode_text(text, Dialect::Sys4);
        assert_eq!(*encoded.last().unwrap(), 0xFF);
        assert_eq!(decode_text(&encoded, 0, Dialect::Sys4).unwrap(), text);
    }

    #[test]
    fn empty_string_is_just_a_terminator() {
        assert_eq!(encode_text("", Dialect::Sys5), vec![0xFF, 0xFF]);
        assert_eq!(encode_text("", Dialect::Sys4), vec![0xFF]);
        assert_eq!(decode_text(&[0xFF, 0xFF], 0, Dialect::Sys5).unwrap(), "");
    }

    #[test]
    fn out_of_bounds_offset_errors() {
        assert!(decode_text(&[0xFF], 5, Dialect::Sys5).is_err());
    }
}
