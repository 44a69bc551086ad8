use anyhow::{bail, Context, Result};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::types::{write_agf_header, write_alpha_header, write_bitmap_headers};
use crate::unpack::{read_bmp, UnpackResult};
use crate::{BitmapInfoHeader, ImageError, RgbQuad, TYPE_32BIT};

/// Packs a BMP back into AGF form, taking the AGF/BMP/ACIF headers and the
/// palette from the unpacked reference. Sectors are re-emitted uncompressed
/// (stored length equals original length).
pub fn pack(bmp: &[u8], reference: &UnpackResult) -> Result<Vec<u8>> {
    let (_, info_header, _, pixel_data) = read_bmp(bmp).context("failed to read BMP")?;

    let mut out = Vec::new();
    write_agf_header(&mut out, &reference.header);

    let sector_palette = if reference.info_header.bit_count == 8 {
        reference.palette.as_slice()
    } else {
        &[]
    };
    let headers_blob = write_bitmap_headers(
        &reference.file_header,
        &reference.info_header,
        sector_palette,
    );
    write_sector(&mut out, &headers_blob);

    if reference.header.kind == TYPE_32BIT {
        let (encoded, alpha) = encode_color_map_with_alpha(&pixel_data, &info_header, reference)?;
        write_sector(&mut out, &encoded);

        let alpha_header = reference
            .alpha_header
            .as_ref()
            .context("reference image has no alpha header")?;
        write_alpha_header(&mut out, alpha_header);
        write_sector(&mut out, &alpha);
    } else {
        write_sector(&mut out, &pixel_data);
    }

    debug!(bytes = out.len(), "packed AGF");
    Ok(out)
}

fn write_sector(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

/// Splits BGRA rows back into the stored color plane and the Y-inverted
/// alpha plane. Palettized references requantize each pixel to the nearest
/// palette color.
fn encode_color_map_with_alpha(
    decoded: &[u8],
    info_header: &BitmapInfoHeader,
    reference: &UnpackResult,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let width = reference.info_header.width as usize;
    let height = reference.info_header.height as usize;

    if info_header.bit_count != 32 {
        bail!(ImageError::NotSupported(info_header.bit_count as u32));
    }
    if info_header.width as usize != width || info_header.height as usize != height {
        bail!(
            "BMP is {}x{} but the reference image is {}x{}",
            info_header.width,
            info_header.height,
            width,
            height
        );
    }
    if decoded.len() < width * height * 4 {
        bail!(ImageError::UnexpectedEof);
    }

    let bit_count = reference.info_header.bit_count as usize;
    let rgb_stride = (width * bit_count / 8 + 3) & !3;

    let alpha_size = if bit_count == 8 {
        height * width
    } else {
        reference.alpha_data.as_ref().map_or(0, Vec::len)
    };
    let encoded_size = if bit_count == 8 {
        height * rgb_stride
    } else {
        reference.pixel_data.len()
    };

    let mut alpha = vec![0u8; alpha_size];
    let mut encoded = vec![0u8; encoded_size];
    let mut cache: FxHashMap<(u8, u8, u8), usize> = FxHashMap::default();

    for y in 0..height {
        let alpha_line = (height - y - 1) * width;
        let bgra_line = y * width * 4;
        let rgb_line = y * rgb_stride;

        for x in 0..width {
            let blue_index = bgra_line + x * 4;
            if bit_count == 8 {
                let color = (
                    decoded[blue_index],
                    decoded[blue_index + 1],
                    decoded[blue_index + 2],
                );
                let palette_index =
                    find_nearest_palette(color, &reference.palette, &mut cache)?;
                encoded[rgb_line + x] = palette_index as u8;
            } else {
                encoded[rgb_line + x * 3] = decoded[blue_index];
                encoded[rgb_line + x * 3 + 1] = decoded[blue_index + 1];
                encoded[rgb_line + x * 3 + 2] = decoded[blue_index + 2];
            }
            alpha[alpha_line + x] = decoded[blue_index + 3];
        }
    }

    Ok((encoded, alpha))
}

/// Nearest palette color by Euclidean distance in RGB space, memoized per
/// exact input triple. An exact match short-circuits the search.
fn find_nearest_palette(
    color: (u8, u8, u8),
    palette: &[RgbQuad],
    cache: &mut FxHashMap<(u8, u8, u8), usize>,
) -> Result<usize> {
    if let Some(&index) = cache.get(&color) {
        return Ok(index);
    }
    if palette.is_empty() {
        bail!("reference image has an empty palette");
    }

    let (blue, green, red) = color;
    for (i, quad) in palette.iter().enumerate() {
        if quad.blue == blue && quad.green == green && quad.red == red {
            return Ok(i);
        }
    }

    let mut best = 0usize;
    let mut best_distance = i64::MAX;
    for (i, quad) in palette.iter().enumerate() {
        let db = quad.blue as i64 - blue as i64;
        let dg = quad.green as i64 - green as i64;
        let dr = quad.red as i64 - red as i64;
        let distance = db * db + dg * dg + dr * dr;
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }

    cache.insert(color, best);
    Ok(best)
}
