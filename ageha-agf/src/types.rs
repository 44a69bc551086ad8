use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ImageError;

/// 24-bit RGB image, two sectors.
pub const TYPE_24BIT: u32 = 1;
/// 32-bit RGBA image, four sectors with a separate alpha plane.
pub const TYPE_32BIT: u32 = 2;

/// The 12-byte AGF file header. Some files carry zeros instead of "ACGF",
/// so only the type field is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgfHeader {
    pub signature: [u8; 4],
    pub kind: u32,
    pub unknown: u32,
}

/// 12-byte sector descriptor. The payload is LZSS-compressed exactly when
/// the stored length differs from the original length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    pub original_length: u32,
    pub original_length_2: u32,
    pub length: u32,
}

impl SectorHeader {
    pub fn is_compressed(&self) -> bool {
        self.length != self.original_length
    }
}

/// The 24-byte "ACIF" header preceding the alpha sector of 32-bit images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaHeader {
    pub signature: [u8; 4],
    pub kind: u32,
    pub unknown: u32,
    pub original_length: u32,
    pub width: u32,
    pub height: u32,
}

/// Windows BITMAPFILEHEADER (14 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapFileHeader {
    pub magic: u16,
    pub size: u32,
    pub reserved_1: u16,
    pub reserved_2: u16,
    pub offset_bits: u32,
}

/// Windows BITMAPINFOHEADER (40 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

/// One palette color, stored blue-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RgbQuad {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub reserved: u8,
}

pub(crate) fn read_agf_header(cursor: &mut Cursor<&[u8]>) -> Result<AgfHeader, ImageError> {
    let mut signature = [0u8; 4];
    read_exact(cursor, &mut signature)?;
    let kind = read_u32(cursor)?;
    let unknown = read_u32(cursor)?;
    if kind != TYPE_24BIT && kind != TYPE_32BIT {
        return Err(ImageError::NotSupported(kind));
    }
    Ok(AgfHeader {
        signature,
        kind,
        unknown,
    })
}

pub(crate) fn read_sector_header(cursor: &mut Cursor<&[u8]>) -> Result<SectorHeader, ImageError> {
    Ok(SectorHeader {
        original_length: read_u32(cursor)?,
        original_length_2: read_u32(cursor)?,
        length: read_u32(cursor)?,
    })
}

pub(crate) fn read_alpha_header(cursor: &mut Cursor<&[u8]>) -> Result<AlphaHeader, ImageError> {
    let mut signature = [0u8; 4];
    read_exact(cursor, &mut signature)?;
    let header = AlphaHeader {
        signature,
        kind: read_u32(cursor)?,
        unknown: read_u32(cursor)?,
        original_length: read_u32(cursor)?,
        width: read_u32(cursor)?,
        height: read_u32(cursor)?,
    };
    if &header.signature != b"ACIF" {
        return Err(ImageError::InvalidMagic("ACIF"));
    }
    Ok(header)
}

/// Parses the BMP headers sector: file header, the non-standard 2-byte gap,
/// info header, then whatever remains as the palette.
pub(crate) fn read_bitmap_headers(
    data: &[u8],
) -> Result<(BitmapFileHeader, BitmapInfoHeader, Vec<RgbQuad>), ImageError> {
    if data.len() < 56 {
        return Err(ImageError::UnexpectedEof);
    }
    let mut cursor = Cursor::new(data);
    let file_header = read_bitmap_file_header(&mut cursor)?;
    cursor.set_position(cursor.position() + 2);
    let info_header = read_bitmap_info_header(&mut cursor)?;

    let mut palette = Vec::new();
    let mut pos = cursor.position() as usize;
    while pos + 4 <= data.len() {
        palette.push(RgbQuad {
            blue: data[pos],
            green: data[pos + 1],
            red: data[pos + 2],
            reserved: data[pos + 3],
        });
        pos += 4;
    }

    Ok((file_header, info_header, palette))
}

pub(crate) fn read_bitmap_file_header(
    cursor: &mut Cursor<&[u8]>,
) -> Result<BitmapFileHeader, ImageError> {
    Ok(BitmapFileHeader {
        magic: read_u16(cursor)?,
        size: read_u32(cursor)?,
        reserved_1: read_u16(cursor)?,
        reserved_2: read_u16(cursor)?,
        offset_bits: read_u32(cursor)?,
    })
}

pub(crate) fn read_bitmap_info_header(
    cursor: &mut Cursor<&[u8]>,
) -> Result<BitmapInfoHeader, ImageError> {
    Ok(BitmapInfoHeader {
        size: read_u32(cursor)?,
        width: read_u32(cursor)? as i32,
        height: read_u32(cursor)? as i32,
        planes: read_u16(cursor)?,
        bit_count: read_u16(cursor)?,
        compression: read_u32(cursor)?,
        size_image: read_u32(cursor)?,
        x_pels_per_meter: read_u32(cursor)? as i32,
        y_pels_per_meter: read_u32(cursor)? as i32,
        clr_used: read_u32(cursor)?,
        clr_important: read_u32(cursor)?,
    })
}

/// Serializes the BMP headers sector, 2-byte gap included.
pub(crate) fn write_bitmap_headers(
    file_header: &BitmapFileHeader,
    info_header: &BitmapInfoHeader,
    palette: &[RgbQuad],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(56 + palette.len() * 4);
    write_bitmap_file_header(&mut out, file_header);
    out.extend_from_slice(&[0, 0]);
    write_bitmap_info_header(&mut out, info_header);
    for quad in palette {
        out.extend_from_slice(&[quad.blue, quad.green, quad.red, quad.reserved]);
    }
    out
}

pub(crate) fn write_bitmap_file_header(out: &mut Vec<u8>, header: &BitmapFileHeader) {
    out.extend_from_slice(&header.magic.to_le_bytes());
    out.extend_from_slice(&header.size.to_le_bytes());
    out.extend_from_slice(&header.reserved_1.to_le_bytes());
    out.extend_from_slice(&header.reserved_2.to_le_bytes());
    out.extend_from_slice(&header.offset_bits.to_le_bytes());
}

pub(crate) fn write_bitmap_info_header(out: &mut Vec<u8>, header: &BitmapInfoHeader) {
    out.extend_from_slice(&header.size.to_le_bytes());
    out.extend_from_slice(&(header.width as u32).to_le_bytes());
    out.extend_from_slice(&(header.height as u32).to_le_bytes());
    out.extend_from_slice(&header.planes.to_le_bytes());
    out.extend_from_slice(&header.bit_count.to_le_bytes());
    out.extend_from_slice(&header.compression.to_le_bytes());
    out.extend_from_slice(&header.size_image.to_le_bytes());
    out.extend_from_slice(&(header.x_pels_per_meter as u32).to_le_bytes());
    out.extend_from_slice(&(header.y_pels_per_meter as u32).to_le_bytes());
    out.extend_from_slice(&header.clr_used.to_le_bytes());
    out.extend_from_slice(&header.clr_important.to_le_bytes());
}

pub(crate) fn write_agf_header(out: &mut Vec<u8>, header: &AgfHeader) {
    out.extend_from_slice(&header.signature);
    out.extend_from_slice(&header.kind.to_le_bytes());
    out.extend_from_slice(&header.unknown.to_le_bytes());
}

pub(crate) fn write_alpha_header(out: &mut Vec<u8>, header: &AlphaHeader) {
    out.extend_from_slice(&header.signature);
    out.extend_from_slice(&header.kind.to_le_bytes());
    out.extend_from_slice(&header.unknown.to_le_bytes());
    out.extend_from_slice(&header.original_length.to_le_bytes());
    out.extend_from_slice(&header.width.to_le_bytes());
    out.extend_from_slice(&header.height.to_le_bytes());
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, ImageError> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| ImageError::UnexpectedEof)
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ImageError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ImageError::UnexpectedEof)
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), ImageError> {
    use std::io::Read;
    cursor.read_exact(buf).map_err(|_| ImageError::UnexpectedEof)
}
