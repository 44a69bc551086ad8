mod lzss;
mod sjis;
mod utf16;

pub use lzss::{compress, decompress};
pub use sjis::{decode_shift_jis, encode_shift_jis};
pub use utf16::{decode_utf16le, encode_utf16le, encode_utf16le_padded, read_utf16le_field};
