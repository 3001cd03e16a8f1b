//! Decoded raster images

use image::{DynamicImage, RgbaImage};

/// A decoded RGBA8 image
///
/// Immutable once built; the compositor only reads its dimensions and pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        RasterImage { pixels }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        RasterImage {
            pixels: image.into_rgba8(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
