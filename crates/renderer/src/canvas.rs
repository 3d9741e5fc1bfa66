//! Tile drawing surfaces.
//!
//! The renderer only needs one drawing primitive: fill an axis-aligned
//! rectangle with a colour. Hosts with their own canvas implement
//! [`Surface`]; [`TileCanvas`] is the in-memory RGBA implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use raster_common::Rgba;

use crate::error::RenderResult;
use crate::png;

/// Integer pixel rectangle in tile-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A tile-sized drawable surface.
pub trait Surface: Send + 'static {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Fill `rect` with `color`. Parts of the rectangle outside the
    /// surface are clipped.
    fn fill_rect(&mut self, rect: PixelRect, color: Rgba);
}

/// Surface handle shared between the host and the task filling it.
pub type SharedSurface<S = TileCanvas> = Arc<Mutex<S>>;

pub fn shared_surface<S: Surface>(surface: S) -> SharedSurface<S> {
    Arc::new(Mutex::new(surface))
}

/// Lock a shared surface. A panic in another holder does not leave the
/// pixel buffer in an inconsistent state, so poisoning is ignored.
pub fn lock_surface<S>(surface: &SharedSurface<S>) -> MutexGuard<'_, S> {
    surface.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory RGBA surface (4 bytes per pixel, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct TileCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    fills: usize,
}

impl TileCanvas {
    /// Create a fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
            fills: 0,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Colour at a pixel, `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgba::new(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ))
    }

    /// Number of `fill_rect` calls that touched at least one pixel.
    pub fn fill_count(&self) -> usize {
        self.fills
    }

    /// Number of pixels with non-zero alpha.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    /// Encode the canvas as PNG, indexed when the palette allows.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        png::create_png_auto(&self.pixels, self.width as usize, self.height as usize)
    }
}

impl Surface for TileCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        if rect.x >= x_end || rect.y >= y_end {
            return;
        }
        self.fills += 1;

        let stride = self.width as usize * 4;
        for y in rect.y..y_end {
            let row = y as usize * stride;
            for x in rect.x..x_end {
                let idx = row + x as usize * 4;
                let dst = &mut self.pixels[idx..idx + 4];
                blend_source_over(dst, color);
            }
        }
    }
}

/// Canvas "source-over" compositing of `src` onto an RGBA pixel.
fn blend_source_over(dst: &mut [u8], src: Rgba) {
    match src.a {
        255 => dst.copy_from_slice(&[src.r, src.g, src.b, 255]),
        0 => {}
        a => {
            let sa = a as f32 / 255.0;
            let da = dst[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            let mix = |s: u8, d: u8| {
                ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a).round() as u8
            };
            dst[0] = mix(src.r, dst[0]);
            dst[1] = mix(src.g, dst[1]);
            dst[2] = mix(src.b, dst[2]);
            dst[3] = (out_a * 255.0).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_blank() {
        let canvas = TileCanvas::new(4, 3);
        assert_eq!(canvas.pixels().len(), 4 * 3 * 4);
        assert!(canvas.is_blank());
        assert_eq!(canvas.fill_count(), 0);
    }

    #[test]
    fn test_fill_rect_paints_only_inside() {
        let mut canvas = TileCanvas::new(4, 4);
        canvas.fill_rect(PixelRect::new(1, 1, 2, 2), Rgba::rgb(10, 20, 30));

        assert_eq!(canvas.painted_pixels(), 4);
        assert_eq!(canvas.pixel(1, 1), Some(Rgba::rgb(10, 20, 30)));
        assert_eq!(canvas.pixel(2, 2), Some(Rgba::rgb(10, 20, 30)));
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::transparent()));
        assert_eq!(canvas.pixel(3, 3), Some(Rgba::transparent()));
    }

    #[test]
    fn test_fill_rect_clips_to_surface() {
        let mut canvas = TileCanvas::new(4, 4);
        canvas.fill_rect(PixelRect::new(3, 3, 10, 10), Rgba::rgb(1, 2, 3));
        assert_eq!(canvas.painted_pixels(), 1);

        canvas.fill_rect(PixelRect::new(8, 8, 2, 2), Rgba::rgb(1, 2, 3));
        assert_eq!(canvas.fill_count(), 1);
    }

    #[test]
    fn test_semi_transparent_fill_blends() {
        let mut canvas = TileCanvas::new(1, 1);
        canvas.fill_rect(PixelRect::new(0, 0, 1, 1), Rgba::rgb(0, 0, 0));
        canvas.fill_rect(PixelRect::new(0, 0, 1, 1), Rgba::new(255, 255, 255, 128));

        let px = canvas.pixel(0, 0).unwrap();
        assert_eq!(px.a, 255);
        assert!(px.r > 120 && px.r < 135);
    }

    #[test]
    fn test_shared_surface_lock() {
        let surface = shared_surface(TileCanvas::new(2, 2));
        lock_surface(&surface).fill_rect(PixelRect::new(0, 0, 1, 1), Rgba::rgb(9, 9, 9));
        assert_eq!(lock_surface(&surface).painted_pixels(), 1);
    }
}
