//! Garment compositing pipeline
//!
//! Draws the base image unscaled, then the overlay scaled into the computed
//! layout rect with source-over blending.

use std::ops::Range;

use image::Rgba;
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{compute_layout, CompositeError, LayoutConfig, LayoutRect};
use super::raster::RasterImage;
use super::sampling::{bilinear_sample, blend_source_over};

/// Result of compositing an overlay onto a base image
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// Composited raster, same dimensions as the base
    pub image: RasterImage,
    /// Where the overlay was drawn
    pub layout: LayoutRect,
}

/// Composite `overlay` onto `base` according to `config`
///
/// Pure and deterministic: identical inputs always produce identical pixels.
pub fn composite(
    base: &RasterImage,
    overlay: &RasterImage,
    config: &LayoutConfig,
) -> Result<CompositeResult, CompositeError> {
    let (base_width, base_height) = base.dimensions();
    let (overlay_width, overlay_height) = overlay.dimensions();

    let layout = compute_layout(base_width, base_height, overlay_width, overlay_height, config)?;

    if layout.overflows_bottom(base_height) {
        debug!(
            bottom = layout.bottom(),
            base_height = base_height,
            "Overlay extends past the bottom of the base image (unclamped)"
        );
    }

    let mut canvas = base.pixels().clone();
    let source = overlay.pixels();

    let cols = covered_range(layout.x, layout.width, base_width);
    let rows = covered_range(layout.y, layout.height, base_height);

    debug!(
        x = layout.x,
        y = layout.y,
        width = layout.width,
        height = layout.height,
        visible_cols = cols.len(),
        visible_rows = rows.len(),
        "Drawing overlay"
    );

    if !cols.is_empty() && !rows.is_empty() {
        let stride = base_width as usize * 4;
        let src_w = overlay_width as f64;
        let src_h = overlay_height as f64;

        // Rows are independent, so each is filled on its own rayon task
        canvas
            .par_chunks_mut(stride)
            .enumerate()
            .skip(rows.start as usize)
            .take(rows.len())
            .for_each(|(py, row)| {
                let v = source_coord(py as u32, layout.y, layout.height, src_h);

                for px in cols.clone() {
                    let u = source_coord(px, layout.x, layout.width, src_w);
                    let sample = bilinear_sample(source, u, v);
                    if sample.0[3] == 0 {
                        continue;
                    }

                    let offset = px as usize * 4;
                    let pixel = &mut row[offset..offset + 4];
                    let dst = Rgba([pixel[0], pixel[1], pixel[2], pixel[3]]);
                    pixel.copy_from_slice(&blend_source_over(dst, sample).0);
                }
            });
    }

    Ok(CompositeResult {
        image: RasterImage::from_rgba(canvas),
        layout,
    })
}

/// Destination pixels whose centre falls inside `[start, start + extent)`,
/// limited to `0..limit`
fn covered_range(start: f64, extent: f64, limit: u32) -> Range<u32> {
    let limit_f = limit as f64;
    let lo = (start - 0.5).ceil().clamp(0.0, limit_f) as u32;
    let hi = (start + extent - 0.5).ceil().clamp(0.0, limit_f) as u32;
    lo..hi.max(lo)
}

/// Map a destination pixel centre into overlay pixel space
fn source_coord(dest: u32, start: f64, extent: f64, source_len: f64) -> f64 {
    let t = (dest as f64 + 0.5 - start) / extent;
    (t * source_len - 0.5).clamp(0.0, source_len - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> RasterImage {
        RasterImage::from_rgba(RgbaImage::from_pixel(width, height, color))
    }

    #[test]
    fn test_overlay_drawn_into_rect() {
        let base = solid(4, 4, RED);
        let overlay = solid(2, 2, BLUE);

        let result = composite(&base, &overlay, &LayoutConfig::new(0.5, 0.25)).unwrap();
        assert_eq!(result.layout, LayoutRect { x: 1.0, y: 1.0, width: 2.0, height: 2.0 });
        assert_eq!(result.image.dimensions(), (4, 4));

        let pixels = result.image.pixels();
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside { BLUE } else { RED };
                assert_eq!(*pixels.get_pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_overlay_scaled_up_keeps_layout() {
        let base = solid(10, 10, RED);
        let mut pixels = RgbaImage::from_pixel(2, 1, BLUE);
        pixels.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let overlay = RasterImage::from_rgba(pixels);

        let result = composite(&base, &overlay, &LayoutConfig::new(1.0, 0.0)).unwrap();
        assert_eq!(result.layout.height, 5.0);

        let out = result.image.pixels();
        assert_eq!(*out.get_pixel(0, 0), BLUE);
        assert_eq!(*out.get_pixel(9, 4), Rgba([0, 255, 0, 255]));
        assert_eq!(*out.get_pixel(0, 5), RED);
    }

    #[test]
    fn test_transparent_overlay_keeps_base() {
        let base = solid(6, 6, RED);
        let overlay = solid(3, 3, Rgba([0, 0, 255, 0]));

        let result = composite(&base, &overlay, &LayoutConfig::default()).unwrap();
        assert_eq!(result.image, base);
    }

    #[test]
    fn test_semi_transparent_overlay_blends() {
        let base = solid(2, 2, Rgba([0, 0, 0, 255]));
        let overlay = solid(1, 1, Rgba([255, 255, 255, 128]));

        let result = composite(&base, &overlay, &LayoutConfig::new(1.0, 0.0)).unwrap();
        for pixel in result.image.pixels().pixels() {
            assert_eq!(*pixel, Rgba([128, 128, 128, 255]));
        }
    }

    #[test]
    fn test_idempotent() {
        let mut base = RgbaImage::new(37, 53);
        for (x, y, pixel) in base.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 7) as u8, (y * 3) as u8, ((x + y) * 5) as u8, 255]);
        }
        let mut overlay = RgbaImage::new(11, 17);
        for (x, y, pixel) in overlay.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 20) as u8, 90, (y * 13) as u8, ((x * y) % 256) as u8]);
        }
        let base = RasterImage::from_rgba(base);
        let overlay = RasterImage::from_rgba(overlay);
        let config = LayoutConfig::new(0.7, 0.3);

        let first = composite(&base, &overlay, &config).unwrap();
        let second = composite(&base, &overlay, &config).unwrap();
        assert_eq!(first.image, second.image);
        assert_eq!(first.layout, second.layout);
    }

    #[test]
    fn test_bottom_overflow_is_unclamped() {
        let base = solid(10, 10, RED);
        let overlay = solid(1, 10, BLUE);

        let result = composite(&base, &overlay, &LayoutConfig::new(1.0, 0.5)).unwrap();
        assert_eq!(result.layout.y, 5.0);
        assert_eq!(result.layout.height, 100.0);

        let out = result.image.pixels();
        assert_eq!(*out.get_pixel(3, 4), RED);
        assert_eq!(*out.get_pixel(3, 5), BLUE);
        assert_eq!(*out.get_pixel(3, 9), BLUE);
    }

    #[test]
    fn test_invalid_overlay_rejected() {
        let base = solid(4, 4, RED);
        let overlay = RasterImage::from_rgba(RgbaImage::new(4, 0));

        let err = composite(&base, &overlay, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidImage { .. }));
    }

    #[test]
    fn test_covered_range() {
        assert_eq!(covered_range(1.0, 2.0, 4), 1..3);
        assert_eq!(covered_range(-3.0, 2.0, 4), 0..0);
        assert_eq!(covered_range(0.4, 0.2, 4), 0..1);
        assert_eq!(covered_range(5.0, 10.0, 8), 5..8);
    }
}
