//! Pixel sampling and blending primitives

use image::{Rgba, RgbaImage};

/// Bilinear interpolation with premultiplied alpha
///
/// Colour channels are weighted by their alpha before averaging so that
/// fully transparent neighbours do not bleed their (meaningless) colour into
/// the result. Coordinates must already be clamped to the image bounds.
pub fn bilinear_sample(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (width, height) = image.dimensions();

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let dx = x - x0 as f64;
    let dy = y - y0 as f64;

    let taps = [
        (image.get_pixel(x0, y0), (1.0 - dx) * (1.0 - dy)),
        (image.get_pixel(x1, y0), dx * (1.0 - dy)),
        (image.get_pixel(x0, y1), (1.0 - dx) * dy),
        (image.get_pixel(x1, y1), dx * dy),
    ];

    let mut alpha = 0.0;
    let mut color = [0.0f64; 3];
    for (pixel, weight) in taps {
        let a = pixel.0[3] as f64 / 255.0 * weight;
        alpha += a;
        for i in 0..3 {
            color[i] += pixel.0[i] as f64 * a;
        }
    }

    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    Rgba([
        to_channel(color[0] / alpha),
        to_channel(color[1] / alpha),
        to_channel(color[2] / alpha),
        to_channel(alpha * 255.0),
    ])
}

/// Source-over alpha compositing of `src` onto `dst`
pub fn blend_source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f64 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }

    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut result = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as f64 * sa + dst.0[i] as f64 * da * (1.0 - sa)) / out_a;
        result[i] = to_channel(c);
    }
    result[3] = to_channel(out_a * 255.0);

    Rgba(result)
}

fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
