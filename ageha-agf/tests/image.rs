use ageha_agf::{pack, unpack, TYPE_24BIT, TYPE_32BIT};

fn sector(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn compressed_sector(data: &[u8]) -> Vec<u8> {
    let compressed = ageha_codec::compress(data);
    assert_ne!(compressed.len(), data.len());
    let mut out = Vec::new();
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

fn agf_header(kind: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"ACGF");
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out
}

fn acif_header(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"ACIF");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(width * height).to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out
}

/// BMP headers blob as AGF stores it: 14-byte file header, 2-byte gap,
/// 40-byte info header, palette quads.
fn headers_blob(width: i32, height: i32, bit_count: u16, palette: &[[u8; 4]]) -> Vec<u8> {
    let offset_bits = 54 + palette.len() as u32 * 4;
    let mut out = Vec::new();
    out.extend_from_slice(&0x4D42u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&offset_bits.to_le_bytes());
    out.extend_from_slice(&[0, 0]); // the non-standard gap
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as u32).to_le_bytes());
    out.extend_from_slice(&(height as u32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&bit_count.to_le_bytes());
    out.extend_from_slice(&[0u8; 24]);
    for quad in palette {
        out.extend_from_slice(quad);
    }
    out
}

/// 2x2 checkerboard, 24-bit color plane plus Y-inverted alpha.
fn checkerboard_agf() -> Vec<u8> {
    let mut agf = agf_header(TYPE_32BIT);
    agf.extend_from_slice(&sector(&headers_blob(2, 2, 24, &[])));
    let pixels = [
        0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0, 0, // row 0: white, black
        0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0, 0, // row 1: black, white
    ];
    agf.extend_from_slice(&sector(&pixels));
    agf.extend_from_slice(&acif_header(2, 2));
    // Alpha rows are stored bottom-up relative to the color rows.
    agf.extend_from_slice(&sector(&[0xAA, 0x00, 0xFF, 0xBB]));
    agf
}

#[test]
fn alpha_plane_is_read_upside_down() {
    let result = unpack(&checkerboard_agf()).unwrap();

    // Pixel (0,0): alpha comes from the last alpha row.
    assert_eq!(result.decoded[0..4], [0xFF, 0xFF, 0xFF, 0xFF]);
    // Pixel (1,1): alpha comes from the first alpha row.
    assert_eq!(result.decoded[12..16], [0xFF, 0xFF, 0xFF, 0x00]);
    // The other two corners.
    assert_eq!(result.decoded[4..8], [0x00, 0x00, 0x00, 0xBB]);
    assert_eq!(result.decoded[8..12], [0x00, 0x00, 0x00, 0xAA]);
}

#[test]
fn pack_reproduces_the_reference_bytes() {
    let agf = checkerboard_agf();
    let result = unpack(&agf).unwrap();
    let bmp = result.to_bmp();

    // 32-bit output gets fresh 54-byte headers and the BGRA plane.
    assert_eq!(bmp.len(), 54 + 16);
    assert_eq!(&bmp[..2], b"BM");

    let repacked = pack(&bmp, &result).unwrap();
    assert_eq!(repacked, agf);
    assert_eq!(unpack(&repacked).unwrap().decoded, result.decoded);
}

#[test]
fn palettized_images_requantize_to_nearest_color() {
    let palette = [
        [0x00, 0x00, 0x00, 0x00], // black
        [0xFF, 0xFF, 0xFF, 0x00], // white
        [0x00, 0x00, 0xFF, 0x00], // red
        [0xFF, 0x00, 0x00, 0x00], // blue
    ];
    let mut agf = agf_header(TYPE_32BIT);
    agf.extend_from_slice(&sector(&headers_blob(2, 2, 8, &palette)));
    let pixels = [
        0u8, 1, 0, 0, // row 0: black, white (stride 4)
        2, 3, 0, 0, // row 1: red, blue
    ];
    agf.extend_from_slice(&sector(&pixels));
    agf.extend_from_slice(&acif_header(2, 2));
    agf.extend_from_slice(&sector(&[0x10, 0x20, 0x30, 0x40]));

    let result = unpack(&agf).unwrap();
    assert_eq!(result.decoded[0..3], [0x00, 0x00, 0x00]);
    assert_eq!(result.decoded[4..7], [0xFF, 0xFF, 0xFF]);

    // Exact colors map back onto their palette slots.
    let bmp = result.to_bmp();
    let repacked = pack(&bmp, &result).unwrap();
    assert_eq!(repacked, agf);

    // A slightly-off color snaps to its nearest palette entry.
    let mut noisy = bmp.clone();
    noisy[54] = 0x0A; // pixel (0,0) blue channel
    noisy[55] = 0x05;
    noisy[56] = 0x08;
    let repacked = pack(&noisy, &result).unwrap();
    assert_eq!(repacked, agf, "near-black must quantize to black");
}

#[test]
fn plain_24_bit_images_round_trip() {
    let mut agf = agf_header(TYPE_24BIT);
    agf.extend_from_slice(&sector(&headers_blob(2, 1, 24, &[])));
    let pixels = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0, 0];
    agf.extend_from_slice(&sector(&pixels));

    let result = unpack(&agf).unwrap();
    assert!(result.alpha_data.is_none());
    assert_eq!(result.decoded, pixels);

    // Original headers are preserved; OffsetBits == 54 means no palette.
    let bmp = result.to_bmp();
    assert_eq!(bmp.len(), 54 + 8);

    let repacked = pack(&bmp, &result).unwrap();
    assert_eq!(repacked, agf);
}

#[test]
fn compressed_sectors_are_inflated() {
    let pixels = vec![0x5Au8; 16 * 4]; // 16x4 is comfortably compressible
    let mut agf = agf_header(TYPE_24BIT);
    agf.extend_from_slice(&sector(&headers_blob(16, 4, 8, &[[0x5A, 0x5A, 0x5A, 0]])));
    agf.extend_from_slice(&compressed_sector(&pixels));

    let result = unpack(&agf).unwrap();
    assert_eq!(result.pixel_data, pixels);
}

#[test]
fn one_by_one_alpha() {
    let mut agf = agf_header(TYPE_32BIT);
    agf.extend_from_slice(&sector(&headers_blob(1, 1, 24, &[])));
    agf.extend_from_slice(&sector(&[0x11, 0x22, 0x33, 0x00]));
    agf.extend_from_slice(&acif_header(1, 1));
    agf.extend_from_slice(&sector(&[0x7F]));

    let result = unpack(&agf).unwrap();
    assert_eq!(result.decoded, [0x11, 0x22, 0x33, 0x7F]);

    let repacked = pack(&result.to_bmp(), &result).unwrap();
    assert_eq!(repacked, agf);
}

#[test]
fn unknown_types_are_rejected_as_possible_mpeg() {
    let mut agf = agf_header(TYPE_24BIT);
    agf[4] = 3; // patch the type field
    agf.extend_from_slice(&sector(&[0u8; 56]));
    let err = format!("{:?}", unpack(&agf).unwrap_err());
    assert!(err.contains("possibly MPEG"), "{}", err);
}
