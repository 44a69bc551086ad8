use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::types::{
    read_agf_header, read_alpha_header, read_bitmap_file_header, read_bitmap_headers,
    read_bitmap_info_header, read_sector_header, write_bitmap_file_header,
    write_bitmap_info_header,
};
use crate::{
    AgfHeader, AlphaHeader, BitmapFileHeader, BitmapInfoHeader, ImageError, RgbQuad, TYPE_32BIT,
};

/// Everything extracted from an AGF file. Header structures are preserved
/// so a later pack can reproduce them verbatim.
#[derive(Debug, Clone)]
pub struct UnpackResult {
    pub header: AgfHeader,
    pub file_header: BitmapFileHeader,
    pub info_header: BitmapInfoHeader,
    pub palette: Vec<RgbQuad>,
    /// The color plane exactly as stored (palette indices or BGR rows).
    pub pixel_data: Vec<u8>,
    pub alpha_header: Option<AlphaHeader>,
    /// The alpha plane, rows inverted relative to the color plane.
    pub alpha_data: Option<Vec<u8>>,
    /// BGRA output for 32-bit images; identical to `pixel_data` otherwise.
    pub decoded: Vec<u8>,
}

/// Unpacks an AGF image.
pub fn unpack(data: &[u8]) -> Result<UnpackResult> {
    let mut cursor = Cursor::new(data);
    let header = read_agf_header(&mut cursor).context("failed to read AGF header")?;

    let headers_blob = read_sector(&mut cursor).context("failed to read BMP header sector")?;
    let (file_header, info_header, palette) =
        read_bitmap_headers(&headers_blob).context("failed to parse BMP headers")?;

    let pixel_data = read_sector(&mut cursor).context("failed to read pixel sector")?;
    debug!(
        width = info_header.width,
        height = info_header.height,
        bit_count = info_header.bit_count,
        kind = header.kind,
        "unpacked AGF planes"
    );

    let mut result = UnpackResult {
        header,
        file_header,
        info_header,
        palette,
        pixel_data,
        alpha_header: None,
        alpha_data: None,
        decoded: Vec::new(),
    };

    if result.header.kind == TYPE_32BIT {
        let alpha_header = read_alpha_header(&mut cursor).context("failed to read ACIF header")?;
        let alpha_data = read_sector(&mut cursor).context("failed to read alpha sector")?;
        result.decoded = decode_color_map_with_alpha(
            &result.info_header,
            &result.pixel_data,
            &result.palette,
            &alpha_data,
        )?;
        result.alpha_header = Some(alpha_header);
        result.alpha_data = Some(alpha_data);
    } else {
        result.decoded = result.pixel_data.clone();
    }

    Ok(result)
}

impl UnpackResult {
    /// Emits the unpacked image as a BMP file. 32-bit images get fresh
    /// headers and the merged BGRA plane; 24-bit and palettized images keep
    /// their original headers, dropping the palette when the original
    /// pixel-data offset (54) says there was none.
    pub fn to_bmp(&self) -> Vec<u8> {
        if self.header.kind == TYPE_32BIT {
            return self.bmp32();
        }
        self.bmp24()
    }

    fn bmp32(&self) -> Vec<u8> {
        let width = self.info_header.width;
        let height = self.info_header.height;
        let data_size = width as i64 * height as i64 * 4;

        let file_header = BitmapFileHeader {
            magic: 0x4D42,
            size: (14 + 40 + data_size) as u32,
            reserved_1: 0,
            reserved_2: 0,
            offset_bits: 14 + 40,
        };
        let info_header = BitmapInfoHeader {
            size: 40,
            width,
            height,
            planes: 1,
            bit_count: 32,
            compression: 0,
            size_image: 0,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        };

        let mut out = Vec::with_capacity(54 + self.decoded.len());
        write_bitmap_file_header(&mut out, &file_header);
        write_bitmap_info_header(&mut out, &info_header);
        out.extend_from_slice(&self.decoded);
        out
    }

    fn bmp24(&self) -> Vec<u8> {
        // An original offset of 54 means the source BMP carried no palette.
        let skip_palette = self.file_header.offset_bits == 54;
        let palette_size = if skip_palette {
            0
        } else {
            self.palette.len() * 4
        };

        let file_header = BitmapFileHeader {
            magic: 0x4D42,
            size: (14 + 40 + palette_size + self.pixel_data.len()) as u32,
            reserved_1: 0,
            reserved_2: 0,
            offset_bits: (14 + 40 + palette_size) as u32,
        };
        // Optional fields stay zero, matching the engine's BMP output.
        let info_header = BitmapInfoHeader {
            size: 40,
            width: self.info_header.width,
            height: self.info_header.height,
            planes: 1,
            bit_count: self.info_header.bit_count,
            compression: 0,
            size_image: 0,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        };

        let mut out = Vec::with_capacity(54 + palette_size + self.pixel_data.len());
        write_bitmap_file_header(&mut out, &file_header);
        write_bitmap_info_header(&mut out, &info_header);
        if !skip_palette {
            for quad in &self.palette {
                out.extend_from_slice(&[quad.blue, quad.green, quad.red, quad.reserved]);
            }
        }
        out.extend_from_slice(&self.pixel_data);
        out
    }
}

/// Reads one sector: a 12-byte descriptor plus stored bytes, decompressed
/// when the stored length differs from the original.
fn read_sector(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let header = read_sector_header(cursor)?;
    let mut data = vec![0u8; header.length as usize];
    cursor
        .read_exact(&mut data)
        .map_err(|_| ImageError::UnexpectedEof)?;

    if header.is_compressed() {
        let decompressed = ageha_codec::decompress(&data);
        if decompressed.len() != header.original_length as usize {
            bail!(
                "sector decompressed to {} bytes, expected {}",
                decompressed.len(),
                header.original_length
            );
        }
        return Ok(decompressed);
    }
    Ok(data)
}

/// Merges the color plane and the Y-inverted alpha plane into BGRA rows.
fn decode_color_map_with_alpha(
    info_header: &BitmapInfoHeader,
    pixel_data: &[u8],
    palette: &[RgbQuad],
    alpha_data: &[u8],
) -> Result<Vec<u8>> {
    let width = info_header.width as usize;
    let height = info_header.height as usize;
    let rgb_stride = (width * info_header.bit_count as usize / 8 + 3) & !3;

    if pixel_data.len() < height * rgb_stride {
        bail!(
            "pixel plane is {} bytes, need {} for {}x{}",
            pixel_data.len(),
            height * rgb_stride,
            width,
            height
        );
    }
    if alpha_data.len() < width * height {
        bail!(
            "alpha plane is {} bytes, need {} for {}x{}",
            alpha_data.len(),
            width * height,
            width,
            height
        );
    }

    let mut decoded = vec![0u8; width * height * 4];
    for y in 0..height {
        let alpha_line = (height - y - 1) * width;
        let bgra_line = y * width * 4;
        let rgb_line = y * rgb_stride;

        for x in 0..width {
            let blue_index = bgra_line + x * 4;
            if info_header.bit_count == 8 {
                let palette_index = pixel_data[rgb_line + x] as usize;
                let quad = palette
                    .get(palette_index)
                    .with_context(|| format!("palette index {} out of range", palette_index))?;
                decoded[blue_index] = quad.blue;
                decoded[blue_index + 1] = quad.green;
                decoded[blue_index + 2] = quad.red;
            } else {
                decoded[blue_index] = pixel_data[rgb_line + x * 3];
                decoded[blue_index + 1] = pixel_data[rgb_line + x * 3 + 1];
                decoded[blue_index + 2] = pixel_data[rgb_line + x * 3 + 2];
            }
            decoded[blue_index + 3] = alpha_data[alpha_line + x];
        }
    }

    Ok(decoded)
}

/// Parses a plain BMP file (no 2-byte gap) into headers, palette and pixel
/// data, for packing back into AGF.
pub fn read_bmp(data: &[u8]) -> Result<(BitmapFileHeader, BitmapInfoHeader, Vec<RgbQuad>, Vec<u8>)> {
    let mut cursor = Cursor::new(data);
    let file_header = read_bitmap_file_header(&mut cursor).context("failed to read BMP header")?;
    if file_header.magic != 0x4D42 {
        bail!(ImageError::InvalidMagic("BM"));
    }
    let info_header =
        read_bitmap_info_header(&mut cursor).context("failed to read BMP info header")?;

    let palette_size = file_header.offset_bits as i64 - 54;
    let mut palette = Vec::new();
    if palette_size > 0 {
        for _ in 0..palette_size / 4 {
            let mut quad = [0u8; 4];
            cursor
                .read_exact(&mut quad)
                .map_err(|_| ImageError::UnexpectedEof)?;
            palette.push(RgbQuad {
                blue: quad[0],
                green: quad[1],
                red: quad[2],
                reserved: quad[3],
            });
        }
    }

    if (file_header.offset_bits as usize) > data.len() {
        bail!(ImageError::UnexpectedEof);
    }
    let pixel_data = data[file_header.offset_bits as usize..].to_vec();
    Ok((file_header, info_header, palette, pixel_data))
}
