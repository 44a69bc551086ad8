use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive magic: expected S4 or S5 format")]
    InvalidMagic,
    #[error("archive format not supported: {0}")]
    NotSupported(String),
    #[error("unexpected end of archive metadata at offset 0x{offset:X}")]
    UnexpectedEof { offset: usize },
}
