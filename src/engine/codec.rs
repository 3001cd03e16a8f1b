//! Image decode/encode boundary

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgb, RgbImage, Rgba};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::raster::RasterImage;
use super::sampling::blend_source_over;

/// JPEG has no alpha channel; transparent areas are flattened onto this
const JPEG_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Output raster format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("Unsupported output format: {}", other)),
        }
    }
}

/// How the encoded result is handed back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    /// Base64 data URL inside a JSON body
    #[default]
    DataUrl,
    /// The encoded image itself as the response body
    Bytes,
}

impl std::str::FromStr for OutputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data_url" | "dataurl" => Ok(OutputEncoding::DataUrl),
            "bytes" | "raw" => Ok(OutputEncoding::Bytes),
            other => Err(format!("Unsupported output encoding: {}", other)),
        }
    }
}

/// Decode raw bytes (format guessed from content)
pub fn decode(bytes: &[u8]) -> Result<RasterImage, CodecError> {
    let image = image::load_from_memory(bytes).map_err(CodecError::Decode)?;
    Ok(RasterImage::from_dynamic(image))
}

/// Encode a raster into the given format
///
/// PNG keeps the alpha channel; JPEG is flattened onto white first.
/// `jpeg_quality` is clamped to 1..=100 and ignored for PNG.
pub fn encode(image: &RasterImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, CodecError> {
    let (width, height) = image.dimensions();
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(image.pixels().as_raw(), width, height, ColorType::Rgba8)
                .map_err(CodecError::Encode)?;
        }
        OutputFormat::Jpeg => {
            let rgb = flatten(image, JPEG_BACKGROUND);
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(CodecError::Encode)?;
        }
    }

    Ok(buffer)
}

/// Composite the image over an opaque background colour
fn flatten(image: &RasterImage, background: Rgba<u8>) -> RgbImage {
    let pixels = image.pixels();
    RgbImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let Rgba([r, g, b, _]) = blend_source_over(background, *pixels.get_pixel(x, y));
        Rgb([r, g, b])
    })
}

/// Wrap encoded bytes in a base64 data URL
pub fn to_data_url(bytes: &[u8], format: OutputFormat) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_image() -> RasterImage {
        let mut pixels = RgbaImage::new(3, 2);
        for (x, y, pixel) in pixels.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 80) as u8, (y * 120) as u8, 33, if x == 0 { 0 } else { 255 }]);
        }
        RasterImage::from_rgba(pixels)
    }

    #[test]
    fn test_png_preserves_pixels_and_alpha() {
        let image = sample_image();
        let bytes = encode(&image, OutputFormat::Png, 90).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_jpeg_encodes() {
        let bytes = encode(&sample_image(), OutputFormat::Jpeg, 85).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
    }

    #[test]
    fn test_jpeg_flattens_transparency_onto_white() {
        let mut pixels = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        pixels.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let image = RasterImage::from_rgba(pixels);

        let flat = flatten(&image, JPEG_BACKGROUND);
        assert_eq!(*flat.get_pixel(5, 5), Rgb([255, 255, 255]));
        assert_eq!(*flat.get_pixel(0, 0), Rgb([0, 0, 0]));

        let bytes = encode(&image, OutputFormat::Jpeg, 95).unwrap();
        let decoded = decode(&bytes).unwrap();
        let corner = decoded.pixels().get_pixel(7, 7);
        assert!(corner.0[..3].iter().all(|&c| c > 240), "got {:?}", corner);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_data_url() {
        assert_eq!(to_data_url(b"abc", OutputFormat::Png), "data:image/png;base64,YWJj");
        assert!(to_data_url(b"abc", OutputFormat::Jpeg).starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JPG".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!("png".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert!("tiff".parse::<OutputFormat>().is_err());
        assert_eq!("raw".parse::<OutputEncoding>(), Ok(OutputEncoding::Bytes));
        assert_eq!("data_url".parse::<OutputEncoding>(), Ok(OutputEncoding::DataUrl));
    }
}
