//! Garment layout specification
//!
//! Computes where a garment (overlay) image lands on a user photo (base).
//! The overlay is scaled to a fraction of the base width, keeps its own
//! aspect ratio, is centred horizontally and dropped from the top by a
//! fraction of the base height.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Layout and compositing errors
#[derive(Debug, Error, PartialEq)]
pub enum CompositeError {
    #[error("Image has non-positive dimensions: {width}x{height} ({role})")]
    InvalidImage {
        role: &'static str,
        width: u32,
        height: u32,
    },
    #[error("Width fraction must be in (0, 1], got {0}")]
    InvalidWidthFraction(f64),
    #[error("Vertical offset fraction must be in [0, 1], got {0}")]
    InvalidVerticalOffset(f64),
}

impl CompositeError {
    /// Whether the error comes from the layout configuration rather than the images
    pub fn is_config(&self) -> bool {
        !matches!(self, CompositeError::InvalidImage { .. })
    }
}

/// Horizontal alignment of the overlay within the base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    #[default]
    Center,
}

/// Named layouts for common garment types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GarmentPreset {
    /// Loose tops: covers most of the width, aligned to the shoulders
    #[default]
    UpperBody,
    /// Narrower garments sitting lower on the torso
    Fitted,
}

impl GarmentPreset {
    /// The layout configuration this preset stands for
    pub fn config(self) -> LayoutConfig {
        match self {
            GarmentPreset::UpperBody => LayoutConfig::new(0.9, 0.2),
            GarmentPreset::Fitted => LayoutConfig::new(0.7, 0.3),
        }
    }
}

impl std::str::FromStr for GarmentPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upper_body" | "upper-body" => Ok(GarmentPreset::UpperBody),
            "fitted" => Ok(GarmentPreset::Fitted),
            other => Err(format!("Unknown garment preset: {}", other)),
        }
    }
}

/// Layout configuration for placing an overlay on a base image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LayoutConfig {
    /// Overlay width as a fraction of base width, in (0, 1]
    pub width_fraction: f64,

    /// Top edge of the overlay as a fraction of base height, in [0, 1]
    pub vertical_offset_fraction: f64,

    /// Horizontal alignment (only centre is supported)
    #[serde(default)]
    pub horizontal_align: HorizontalAlign,
}

impl LayoutConfig {
    /// Create a centred layout configuration
    pub fn new(width_fraction: f64, vertical_offset_fraction: f64) -> Self {
        LayoutConfig {
            width_fraction,
            vertical_offset_fraction,
            horizontal_align: HorizontalAlign::Center,
        }
    }

    /// Validate the fractions
    pub fn validate(&self) -> Result<(), CompositeError> {
        let f = self.width_fraction;
        if !f.is_finite() || f <= 0.0 || f > 1.0 {
            return Err(CompositeError::InvalidWidthFraction(f));
        }

        let v = self.vertical_offset_fraction;
        if !v.is_finite() || !(0.0..=1.0).contains(&v) {
            return Err(CompositeError::InvalidVerticalOffset(v));
        }

        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        GarmentPreset::default().config()
    }
}

/// Placement rectangle in base image coordinates (origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LayoutRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutRect {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the rect spills past the bottom of a base of the given height
    pub fn overflows_bottom(&self, base_height: u32) -> bool {
        self.bottom() > base_height as f64
    }
}

fn check_dimensions(role: &'static str, width: u32, height: u32) -> Result<(), CompositeError> {
    if width == 0 || height == 0 {
        return Err(CompositeError::InvalidImage { role, width, height });
    }
    Ok(())
}

/// Compute the overlay placement for the given base and overlay dimensions
///
/// The result is not clamped: `x` is negative when the overlay is wider than
/// the base, and the rect may extend past the bottom edge.
pub fn compute_layout(
    base_width: u32,
    base_height: u32,
    overlay_width: u32,
    overlay_height: u32,
    config: &LayoutConfig,
) -> Result<LayoutRect, CompositeError> {
    check_dimensions("base", base_width, base_height)?;
    check_dimensions("overlay", overlay_width, overlay_height)?;
    config.validate()?;

    let base_w = base_width as f64;
    let base_h = base_height as f64;

    let width = base_w * config.width_fraction;
    let aspect_ratio = overlay_width as f64 / overlay_height as f64;
    let height = width / aspect_ratio;

    let x = match config.horizontal_align {
        HorizontalAlign::Center => (base_w - width) / 2.0,
    };
    let y = base_h * config.vertical_offset_fraction;

    Ok(LayoutRect { x, y, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_upper_body_scenario() {
        let rect = compute_layout(800, 1000, 400, 600, &LayoutConfig::new(0.9, 0.2)).unwrap();
        assert!((rect.width - 720.0).abs() < EPS);
        assert!((rect.height - 1080.0).abs() < 1e-6);
        assert!((rect.x - 40.0).abs() < EPS);
        assert!((rect.y - 200.0).abs() < EPS);
        assert!(rect.overflows_bottom(1000));
    }

    #[test]
    fn test_fitted_scenario() {
        let rect = compute_layout(600, 900, 300, 300, &GarmentPreset::Fitted.config()).unwrap();
        assert!((rect.width - 420.0).abs() < EPS);
        assert!((rect.height - 420.0).abs() < EPS);
        assert!((rect.x - 90.0).abs() < EPS);
        assert!((rect.y - 270.0).abs() < EPS);
    }

    #[test]
    fn test_centred_and_aspect_preserved() {
        let sizes = [(640u32, 480u32), (1, 1), (1920, 1080), (333, 777)];
        let overlays = [(400u32, 600u32), (17, 3), (1000, 1000), (5, 250)];
        let fractions = [0.1, 0.33, 0.9, 1.0];

        for &(bw, bh) in &sizes {
            for &(ow, oh) in &overlays {
                for &f in &fractions {
                    let rect = compute_layout(bw, bh, ow, oh, &LayoutConfig::new(f, 0.5)).unwrap();
                    let w = bw as f64;
                    assert!((rect.width - w * f).abs() < 1e-9 * w.max(1.0));
                    assert!((rect.x + rect.width / 2.0 - w / 2.0).abs() < 1e-9 * w.max(1.0));

                    let r = ow as f64 / oh as f64;
                    assert!((rect.width / rect.height - r).abs() < 1e-9 * r.max(1.0));
                }
            }
        }
    }

    #[test]
    fn test_boundaries() {
        let rect = compute_layout(500, 700, 100, 50, &LayoutConfig::new(1.0, 0.0)).unwrap();
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn test_zero_height_overlay() {
        let err = compute_layout(800, 1000, 400, 0, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidImage { role: "overlay", .. }));
        assert!(!err.is_config());
    }

    #[test]
    fn test_zero_width_base() {
        let err = compute_layout(0, 1000, 400, 400, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidImage { role: "base", .. }));
    }

    #[test]
    fn test_invalid_fractions() {
        for f in [0.0, -0.1, 1.5, f64::NAN] {
            let err = LayoutConfig::new(f, 0.2).validate().unwrap_err();
            assert!(matches!(err, CompositeError::InvalidWidthFraction(_)));
            assert!(err.is_config());
        }
        for v in [-0.01, 1.01, f64::INFINITY] {
            assert!(matches!(
                LayoutConfig::new(0.5, v).validate(),
                Err(CompositeError::InvalidVerticalOffset(_))
            ));
        }
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("upper_body".parse::<GarmentPreset>(), Ok(GarmentPreset::UpperBody));
        assert_eq!(" Fitted ".parse::<GarmentPreset>(), Ok(GarmentPreset::Fitted));
        assert!("cape".parse::<GarmentPreset>().is_err());
        assert_eq!(LayoutConfig::default(), LayoutConfig::new(0.9, 0.2));
    }

    #[test]
    fn test_config_deserialize_defaults_align() {
        let config: LayoutConfig =
            serde_json::from_str(r#"{"width_fraction":0.7,"vertical_offset_fraction":0.3}"#).unwrap();
        assert_eq!(config.horizontal_align, HorizontalAlign::Center);
    }
}
