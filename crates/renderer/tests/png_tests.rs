//! Tests for PNG encoding of painted tiles.
//!
//! Covers format selection (indexed vs RGBA), chunk layout and that the
//! compressed scanlines decode back to the canvas pixels.

use std::io::Read;

use raster_common::{ColorScale, Rgba};
use renderer::png::{create_png, create_png_auto, create_png_indexed};
use renderer::{PixelRect, Surface, TileCanvas};

// ============================================================================
// Helper functions
// ============================================================================

/// Split a PNG into (chunk type, data) pairs, checking every CRC.
fn chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let mut out = Vec::new();
    let mut pos = 8;
    while pos < png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let kind: [u8; 4] = png[pos + 4..pos + 8].try_into().unwrap();
        let data = png[pos + 8..pos + 8 + len].to_vec();
        let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&kind);
        hasher.update(&data);
        assert_eq!(hasher.finalize(), crc, "bad CRC on {:?}", kind);

        out.push((kind, data));
        pos += 12 + len;
    }
    out
}

fn chunk_names(png: &[u8]) -> Vec<String> {
    chunks(png)
        .iter()
        .map(|(kind, _)| String::from_utf8_lossy(kind).into_owned())
        .collect()
}

/// Inflate IDAT and strip the per-row filter bytes.
fn decode_rows(png: &[u8], row_len: usize) -> Vec<u8> {
    let idat: Vec<u8> = chunks(png)
        .into_iter()
        .filter(|(kind, _)| kind == b"IDAT")
        .flat_map(|(_, data)| data)
        .collect();
    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(&idat[..])
        .read_to_end(&mut raw)
        .unwrap();

    raw.chunks_exact(row_len + 1)
        .flat_map(|row| {
            assert_eq!(row[0], 0, "only filter type 0 is written");
            row[1..].to_vec()
        })
        .collect()
}

/// A 256x256 tile painted in 32x32 cells from a five stop scale, like a
/// rendered single band tile with its west half missing.
fn scale_painted_tile() -> TileCanvas {
    let scale = ColorScale::from_spec(&raster_common::ColorScaleSpec::Palette("viridis".into()))
        .unwrap();
    let mut canvas = TileCanvas::new(256, 256);
    for h in 0..8u32 {
        for w in 4..8u32 {
            let t = (h * 8 + w) as f64 / 63.0;
            let color = scale.sample(t).unwrap();
            canvas.fill_rect(PixelRect::new(w * 32, h * 32, 32, 32), color);
        }
    }
    canvas
}

// ============================================================================
// Format selection
// ============================================================================

#[test]
fn test_scale_painted_tile_is_indexed() {
    let canvas = scale_painted_tile();
    let png = canvas.to_png().unwrap();

    let names = chunk_names(&png);
    assert_eq!(names, vec!["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);

    let (_, ihdr) = &chunks(&png)[0];
    assert_eq!(u32::from_be_bytes(ihdr[0..4].try_into().unwrap()), 256);
    assert_eq!(u32::from_be_bytes(ihdr[4..8].try_into().unwrap()), 256);
    assert_eq!(ihdr[8], 8, "bit depth");
    assert_eq!(ihdr[9], 3, "color type");
}

#[test]
fn test_opaque_tile_has_no_trns() {
    let mut canvas = TileCanvas::new(64, 64);
    canvas.fill_rect(PixelRect::new(0, 0, 64, 32), Rgba::rgb(255, 0, 0));
    canvas.fill_rect(PixelRect::new(0, 32, 64, 32), Rgba::rgb(0, 0, 255));

    let png = canvas.to_png().unwrap();
    assert_eq!(chunk_names(&png), vec!["IHDR", "PLTE", "IDAT", "IEND"]);
}

#[test]
fn test_many_colours_fall_back_to_rgba() {
    let mut canvas = TileCanvas::new(32, 32);
    for y in 0..32u32 {
        for x in 0..32u32 {
            canvas.fill_rect(
                PixelRect::new(x, y, 1, 1),
                Rgba::rgb((x * 8) as u8, (y * 8) as u8, 128),
            );
        }
    }

    let png = canvas.to_png().unwrap();
    assert_eq!(chunk_names(&png), vec!["IHDR", "IDAT", "IEND"]);
    assert_eq!(chunks(&png)[0].1[9], 6);
    assert_eq!(decode_rows(&png, 32 * 4), canvas.pixels());
}

// ============================================================================
// Pixel fidelity
// ============================================================================

#[test]
fn test_indexed_pixels_decode_through_palette() {
    let canvas = scale_painted_tile();
    let png = canvas.to_png().unwrap();
    let parts = chunks(&png);

    let plte = &parts[1].1;
    let trns = &parts[2].1;
    let indices = decode_rows(&png, 256);
    assert_eq!(indices.len(), 256 * 256);

    for (i, &idx) in indices.iter().enumerate() {
        let idx = idx as usize;
        let expected = &canvas.pixels()[i * 4..i * 4 + 4];
        assert_eq!(&plte[idx * 3..idx * 3 + 3], &expected[0..3]);
        assert_eq!(trns[idx], expected[3]);
    }
}

#[test]
fn test_rgba_encoder_round_trips_pixels() {
    let pixels: Vec<u8> = (0..3 * 2)
        .flat_map(|i| [i as u8 * 40, 255 - i as u8 * 40, 7, 200])
        .collect();
    let png = create_png(&pixels, 3, 2).unwrap();
    assert_eq!(decode_rows(&png, 12), pixels);
}

#[test]
fn test_indexed_encoder_with_explicit_palette() {
    let palette = [(0, 0, 0, 0), (255, 255, 255, 255)];
    let indices = [0, 1, 1, 0];
    let png = create_png_indexed(2, 2, &palette, &indices).unwrap();
    assert_eq!(decode_rows(&png, 2), indices);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_zero_sized_image_is_rejected() {
    assert!(create_png_auto(&[], 0, 0).is_err());
    assert!(create_png(&[], 0, 4).is_err());
}

#[test]
fn test_short_index_buffer_is_rejected() {
    let palette = [(0, 0, 0, 255)];
    assert!(create_png_indexed(2, 2, &palette, &[0, 0, 0]).is_err());
}
