//! AGF image codec: a wrapper around Windows BMP with LZSS-compressed
//! sectors and, for 32-bit images, a separately stored alpha plane whose
//! rows are inverted relative to the color plane.

mod error;
mod pack;
mod types;
mod unpack;

pub use error::ImageError;
pub use pack::pack;
pub use types::{
    AgfHeader, AlphaHeader, BitmapFileHeader, BitmapInfoHeader, RgbQuad, SectorHeader, TYPE_24BIT,
    TYPE_32BIT,
};
pub use unpack::{read_bmp, unpack, UnpackResult};
