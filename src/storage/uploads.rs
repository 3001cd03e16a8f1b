//! Transient storage for uploaded images
//!
//! Uploaded bytes live only for the duration of one request. Two strategies
//! are available: an in-memory map (default, nothing to clean up) and a
//! scratch directory on disk for deployments that prefer not to hold large
//! uploads in RAM. Either way, `take` hands the bytes back and releases them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors that can occur while stashing or reading uploads
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload not found: {0}")]
    NotFound(Uuid),

    #[error("Upload exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Missing upload field: {0}")]
    MissingField(&'static str),

    #[error("Malformed multipart payload: {0}")]
    Multipart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a stashed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadHandle(Uuid);

impl UploadHandle {
    fn new() -> Self {
        UploadHandle(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Which backing store holds uploads between receipt and decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    #[default]
    Memory,
    Disk,
}

/// Transient upload storage
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Short name for logs
    fn kind(&self) -> &'static str;

    /// Store the bytes, returning a handle to retrieve them
    async fn put(&self, bytes: Bytes) -> Result<UploadHandle, UploadError>;

    /// Retrieve the bytes and release the storage
    async fn take(&self, handle: UploadHandle) -> Result<Bytes, UploadError>;

    /// Release the storage without reading it
    async fn discard(&self, handle: UploadHandle) {
        if let Err(e) = self.take(handle).await {
            debug!(upload = %handle.id(), error = %e, "Discarding upload failed");
        }
    }
}

/// In-memory upload store
#[derive(Default)]
pub struct MemoryUploadStore {
    entries: Mutex<HashMap<UploadHandle, Bytes>>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uploads currently held
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bytes: Bytes) -> Result<UploadHandle, UploadError> {
        let handle = UploadHandle::new();
        self.entries.lock().insert(handle, bytes);
        Ok(handle)
    }

    async fn take(&self, handle: UploadHandle) -> Result<Bytes, UploadError> {
        self.entries
            .lock()
            .remove(&handle)
            .ok_or(UploadError::NotFound(handle.id()))
    }
}

/// Scratch-directory upload store
pub struct DiskUploadStore {
    dir: PathBuf,
}

impl DiskUploadStore {
    /// Create the store, making the scratch directory if needed
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, UploadError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(DiskUploadStore { dir })
    }

    fn path_for(&self, handle: UploadHandle) -> PathBuf {
        self.dir.join(format!("{}.upload", handle.id()))
    }
}

#[async_trait]
impl UploadStore for DiskUploadStore {
    fn kind(&self) -> &'static str {
        "disk"
    }

    async fn put(&self, bytes: Bytes) -> Result<UploadHandle, UploadError> {
        let handle = UploadHandle::new();
        tokio::fs::write(self.path_for(handle), &bytes).await?;
        Ok(handle)
    }

    async fn take(&self, handle: UploadHandle) -> Result<Bytes, UploadError> {
        let path = self.path_for(handle);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::NotFound(handle.id()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove upload file");
        }

        Ok(Bytes::from(bytes))
    }
}

/// Build the store selected by configuration
pub async fn build_store(
    strategy: UploadStrategy,
    dir: &Path,
) -> Result<Arc<dyn UploadStore>, UploadError> {
    let store: Arc<dyn UploadStore> = match strategy {
        UploadStrategy::Memory => Arc::new(MemoryUploadStore::new()),
        UploadStrategy::Disk => Arc::new(DiskUploadStore::new(dir).await?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_take_releases() {
        let store = MemoryUploadStore::new();
        let handle = store.put(Bytes::from_static(b"garment")).await.unwrap();
        assert_eq!(store.len(), 1);

        let bytes = store.take(handle).await.unwrap();
        assert_eq!(&bytes[..], b"garment");
        assert_eq!(store.len(), 0);

        assert!(matches!(store.take(handle).await, Err(UploadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disk_put_take_removes_file() {
        let dir = std::env::temp_dir().join(format!("tryon-uploads-{}", Uuid::new_v4()));
        let store = DiskUploadStore::new(&dir).await.unwrap();

        let handle = store.put(Bytes::from_static(b"photo")).await.unwrap();
        assert!(store.path_for(handle).exists());

        let bytes = store.take(handle).await.unwrap();
        assert_eq!(&bytes[..], b"photo");
        assert!(!store.path_for(handle).exists());
        assert!(matches!(store.take(handle).await, Err(UploadError::NotFound(_))));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_discard_releases() {
        tokio_test::block_on(async {
            let store = MemoryUploadStore::new();
            let handle = store.put(Bytes::from_static(b"x")).await.unwrap();
            store.discard(handle).await;
            assert_eq!(store.len(), 0);
        });
    }

    #[tokio::test]
    async fn test_build_store_strategy() {
        let dir = std::env::temp_dir().join(format!("tryon-uploads-{}", Uuid::new_v4()));
        let memory = build_store(UploadStrategy::Memory, &dir).await.unwrap();
        assert_eq!(memory.kind(), "memory");
        assert!(!dir.exists());

        let disk = build_store(UploadStrategy::Disk, &dir).await.unwrap();
        assert_eq!(disk.kind(), "disk");
        assert!(dir.exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
