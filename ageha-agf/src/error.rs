use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported AGF type {0} (possibly MPEG)")]
    NotSupported(u32),
    #[error("invalid {0} signature")]
    InvalidMagic(&'static str),
    #[error("unexpected end of image data")]
    UnexpectedEof,
}
