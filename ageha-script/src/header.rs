use std::io::Cursor;

use ageha_codec::encode_utf16le_padded;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::{Dialect, ScriptError};

pub const SYS4_HEADER_SIZE: usize = 0x3C;
pub const SYS5_HEADER_SIZE: usize = 0x44;

/// The fixed BIN header: signature, six local-storage counters, the
/// sub-header length (always 0x1C), and the three (length, offset) pairs
/// describing the footer tables. Table offsets are in 4-byte units from the
/// end of the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub dialect: Dialect,
    pub signature: String,
    pub local_integer_1: u32,
    pub local_floats: u32,
    pub local_strings_1: u32,
    pub local_integer_2: u32,
    /// Preserved verbatim; semantics undocumented.
    pub unknown_data: u32,
    pub local_strings_2: u32,
    pub sub_header_length: u32,
    pub table1_length: u32,
    pub table1_offset: u32,
    pub table2_length: u32,
    pub table2_offset: u32,
    pub table3_length: u32,
    pub table3_offset: u32,
}

impl Header {
    pub fn byte_len(&self) -> usize {
        match self.dialect {
            Dialect::Sys4 => SYS4_HEADER_SIZE,
            Dialect::Sys5 => SYS5_HEADER_SIZE,
        }
    }

    /// Byte offset where instruction data ends, taken from the first
    /// non-empty table. Zero means no table carries the boundary.
    pub fn data_end(&self) -> usize {
        if self.table1_length > 0 {
            return self.byte_len() + self.table1_offset as usize * 4;
        }
        if self.table2_length > 0 {
            return self.byte_len() + self.table2_offset as usize * 4;
        }
        if self.table3_length > 0 {
            return self.byte_len() + self.table3_offset as usize * 4;
        }
        0
    }

    /// Detects the dialect from the first 8 bytes: SYS5 signatures are
    /// UTF-16LE (odd bytes zero), SYS4 signatures plain ASCII.
    pub fn detect(data: &[u8]) -> Result<Dialect, ScriptError> {
        if data.len() < 16 {
            return Err(ScriptError::UnexpectedEof { offset: data.len() });
        }
        if data[1] == 0 && data[3] == 0 && data[5] == 0 && data[7] == 0 {
            if data[0] == b'S' && data[2] == b'Y' && data[4] == b'S' && data[6] == b'5' {
                return Ok(Dialect::Sys5);
            }
        }
        if &data[..4] == b"SYS4" {
            return Ok(Dialect::Sys4);
        }
        Err(ScriptError::InvalidMagic)
    }

    pub fn parse(data: &[u8]) -> Result<Header, ScriptError> {
        let dialect = Header::detect(data)?;
        let (header_size, sig_size) = match dialect {
            Dialect::Sys4 => (SYS4_HEADER_SIZE, 8),
            Dialect::Sys5 => (SYS5_HEADER_SIZE, 16),
        };
        if data.len() < header_size {
            return Err(ScriptError::UnexpectedEof { offset: data.len() });
        }

        let signature = match dialect {
            Dialect::Sys4 => String::from_utf8_lossy(&data[..8]).into_owned(),
            Dialect::Sys5 => {
                let units: Vec<u16> = data[..16]
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .take_while(|&u| u != 0)
                    .collect();
                String::from_utf16_lossy(&units)
            }
        };

        let mut cursor = Cursor::new(&data[sig_size..header_size]);
        let mut fields = [0u32; 13];
        for field in fields.iter_mut() {
            *field = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| ScriptError::UnexpectedEof { offset: header_size })?;
        }

        Ok(Header {
            dialect,
            signature,
            local_integer_1: fields[0],
            local_floats: fields[1],
            local_strings_1: fields[2],
            local_integer_2: fields[3],
            unknown_data: fields[4],
            local_strings_2: fields[5],
            sub_header_length: fields[6],
            table1_length: fields[7],
            table1_offset: fields[8],
            table2_length: fields[9],
            table2_offset: fields[10],
            table3_length: fields[11],
            table3_offset: fields[12],
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_len());
        match self.dialect {
            Dialect::Sys4 => {
                let mut sig = self.signature.as_bytes().to_vec();
                sig.resize(8, 0);
                buf.extend_from_slice(&sig[..8]);
            }
            Dialect::Sys5 => {
                // The on-disk signature is space-padded to 8 code units.
                let mut sig = self.signature.clone();
                while sig.chars().count() < 8 {
                    sig.push(' ');
                }
                let sig: String = sig.chars().take(8).collect();
                buf.extend_from_slice(&encode_utf16le_padded(&sig, 16));
            }
        }
        let fields = [
            self.local_integer_1,
            self.local_floats,
            self.local_strings_1,
            self.local_integer_2,
            self.unknown_data,
            self.local_strings_2,
            self.sub_header_length,
            self.table1_length,
            self.table1_offset,
            self.table2_length,
            self.table2_offset,
            self.table3_length,
            self.table3_offset,
        ];
        for field in fields {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(dialect: Dialect) -> Header {
        Header {
            dialect,
            signature: match dialect {
                Dialect::Sys4 => "SYS4405a".to_string(),
                Dialect::Sys5 => "SYS5501".to_string(),
            },
            local_integer_1: 1,
            local_floats: 2,
            local_strings_1: 3,
            local_integer_2: 4,
            unknown_data: 5,
            local_strings_2: 6,
            sub_header_length: 0x1C,
            table1_length: 0,
            table1_offset: 0,
            table2_length: 0,
            table2_offset: 0,
            table3_length: 0,
            table3_offset: 0,
        }
    }

    #[test]
    fn sys5_header_round_trip() {
        let header = sample_header(Dialect::Sys5);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), SYS5_HEADER_SIZE);
        let parsed = Header::parse(&bytes).unwrap();
        // The signature re-parses with its space padding trimmed by the null
        // test; compare the serialized form instead.
        assert_eq!(parsed.to_bytes(), bytes);
        assert_eq!(parsed.dialect, Dialect::Sys5);
        assert_eq!(parsed.unknown_data, 5);
    }

    #[test]
    fn sys4_header_round_trip() {
        let header = sample_header(Dialect::Sys4);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), SYS4_HEADER_SIZE);
        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 64];
        assert!(matches!(
            Header::parse(&data),
            Err(ScriptError::InvalidMagic)
        ));
    }

    #[test]
    fn data_end_uses_first_non_empty_table() {
        let mut header = sample_header(Dialect::Sys5);
        assert_eq!(header.data_end(), 0);
        header.table2_length = 4;
        header.table2_offset = 0x10;
        assert_eq!(header.data_end(), SYS5_HEADER_SIZE + 0x40);
    }
}
