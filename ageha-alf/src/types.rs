use std::fs::File;
use std::path::PathBuf;

use ageha_codec::decode_utf16le;

use crate::ArchiveError;

pub const S4_HEADER_SIZE: usize = 300;
pub const S5_HEADER_SIZE: usize = 540;
pub const S4_FILE_ENTRY_SIZE: usize = 80;
pub const S5_FILE_ENTRY_SIZE: usize = 144;
pub const S4_ARCHIVE_NAME_SIZE: usize = 256;
pub const S5_ARCHIVE_NAME_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// `S4IC`/`S4AC`: UTF-8 names, 300-byte header.
    S4,
    /// `S5IN`/`S5IC`/`S5AC`: UTF-16LE names, 540-byte header.
    S5,
}

/// The fixed index header. The signature/title area and the trailing unknown
/// bytes are carried verbatim in `raw` so rewrites can reproduce them.
#[derive(Debug, Clone)]
pub struct IndexHeader {
    pub version: Version,
    pub signature: String,
    pub title: String,
    pub raw: Vec<u8>,
}

impl IndexHeader {
    pub fn byte_len(&self) -> usize {
        match self.version {
            Version::S4 => S4_HEADER_SIZE,
            Version::S5 => S5_HEADER_SIZE,
        }
    }

    /// The fourth magic character distinguishes compressed (`C`) from
    /// uncompressed (`N`) metadata.
    pub fn is_compressed(&self) -> bool {
        self.signature.as_bytes().get(3) == Some(&b'C')
    }

    /// The third magic character marks append archives (`A`).
    pub fn is_append(&self) -> bool {
        self.signature.as_bytes().get(2) == Some(&b'A')
    }

    /// Offset of the 12-byte compression descriptor, or of the inline
    /// metadata for uncompressed S5 indices.
    pub fn metadata_offset(&self) -> usize {
        match self.version {
            Version::S4 => {
                if self.is_append() {
                    0x10C
                } else {
                    S4_HEADER_SIZE
                }
            }
            Version::S5 => {
                if !self.is_compressed() {
                    0x200
                } else if self.is_append() {
                    0x214
                } else {
                    0x21C
                }
            }
        }
    }

    /// Detects S4 vs S5 from the first bytes: S5 magics are UTF-16LE.
    pub fn detect(data: &[u8]) -> Result<Version, ArchiveError> {
        if data.len() < 8 {
            return Err(ArchiveError::UnexpectedEof { offset: data.len() });
        }
        if data[1] == 0 && data[3] == 0 && data[5] == 0 && data[7] == 0 {
            let magic = decode_utf16le(&data[..8]);
            if magic.starts_with("S5") {
                return Ok(Version::S5);
            }
        }
        if data[0] == b'S' && data[1] == b'4' {
            return Ok(Version::S4);
        }
        Err(ArchiveError::InvalidMagic)
    }

    pub fn parse(data: &[u8]) -> Result<IndexHeader, ArchiveError> {
        let version = IndexHeader::detect(data)?;
        let header_size = match version {
            Version::S4 => S4_HEADER_SIZE,
            Version::S5 => S5_HEADER_SIZE,
        };
        if data.len() < header_size {
            return Err(ArchiveError::UnexpectedEof { offset: data.len() });
        }

        let (signature, title) = match version {
            Version::S4 => {
                let area = &data[..240];
                let sig_end = area[..8].iter().position(|&b| b == 0).unwrap_or(8);
                let signature = String::from_utf8_lossy(&area[..sig_end]).into_owned();
                // The title follows the signature's terminator.
                let title = match area.iter().position(|&b| b == 0) {
                    Some(null) => {
                        let rest = &area[null + 1..];
                        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                        String::from_utf8_lossy(&rest[..end]).into_owned()
                    }
                    None => String::new(),
                };
                (signature, title)
            }
            Version::S5 => {
                let signature = decode_utf16le(&data[..16]);
                let title = decode_utf16le(&data[16..480]);
                (signature, title)
            }
        };

        Ok(IndexHeader {
            version,
            signature,
            title,
            raw: data[..header_size].to_vec(),
        })
    }
}

/// One file entry of the index metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub archive_index: u32,
    pub file_index: u32,
    pub offset: u32,
    pub length: u32,
}

/// A referenced container file. The handle is `None` when the container was
/// missing at open time; reads against it fail, the rest of the archive
/// stays usable.
#[derive(Debug)]
pub struct ArchiveSource {
    pub name: String,
    pub path: PathBuf,
    pub handle: Option<File>,
}

#[derive(Debug)]
pub struct Archive {
    pub header: IndexHeader,
    pub sources: Vec<ArchiveSource>,
    pub entries: Vec<FileEntry>,
    pub index_path: PathBuf,
}

impl Archive {
    pub fn list(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Releases all container handles. Reads fail afterwards.
    pub fn close(&mut self) {
        for source in self.sources.iter_mut() {
            source.handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ageha_codec::encode_utf16le_padded;

    #[test]
    fn s5_magic_classification() {
        let mut raw = vec![0u8; S5_HEADER_SIZE];
        raw[..16].copy_from_slice(&encode_utf16le_padded("S5AC", 16));
        raw[16..32].copy_from_slice(&encode_utf16le_padded("Title", 16));
        let header = IndexHeader::parse(&raw).unwrap();
        assert_eq!(header.version, Version::S5);
        assert!(header.is_compressed());
        assert!(header.is_append());
        assert_eq!(header.metadata_offset(), 0x214);
        assert_eq!(header.title, "Title");
    }

    #[test]
    fn s4_magic_classification() {
        let mut raw = vec![0u8; S4_HEADER_SIZE];
        raw[..4].copy_from_slice(b"S4IC");
        raw[5..10].copy_from_slice(b"Title");
        let header = IndexHeader::parse(&raw).unwrap();
        assert_eq!(header.version, Version::S4);
        assert!(header.is_compressed());
        assert!(!header.is_append());
        assert_eq!(header.metadata_offset(), S4_HEADER_SIZE);
        assert_eq!(header.signature, "S4IC");
        assert_eq!(header.title, "Title");
    }

    #[test]
    fn uncompressed_s5_metadata_is_inline() {
        let mut raw = vec![0u8; S5_HEADER_SIZE];
        raw[..16].copy_from_slice(&encode_utf16le_padded("S5IN", 16));
        let header = IndexHeader::parse(&raw).unwrap();
        assert!(!header.is_compressed());
        assert_eq!(header.metadata_offset(), 0x200);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            IndexHeader::detect(b"XXXXXXXXXXXX"),
            Err(ArchiveError::InvalidMagic)
        ));
    }
}
