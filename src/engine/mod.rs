//! Try-on compositing engine
//!
//! This module contains the pixel side of the service:
//! - Decoded raster images and the codec boundary
//! - Bilinear sampling and source-over blending
//! - The garment compositor

mod raster;
mod sampling;
mod compositor;
pub mod codec;

#[cfg(test)]
pub use raster::RasterImage;
pub use compositor::composite;
pub use codec::{CodecError, OutputEncoding, OutputFormat};
