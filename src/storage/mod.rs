//! Storage module for transient uploads
//!
//! Holds uploaded images between receipt and decoding, either in memory or
//! in a scratch directory.

mod uploads;

pub use uploads::{build_store, UploadError, UploadHandle, UploadStore, UploadStrategy};

#[cfg(test)]
pub use uploads::MemoryUploadStore;
