//! Storage abstraction trait
//!
//! Every backend implements [`ImageStorage`]; callers hold an
//! `Arc<dyn ImageStorage>` and never depend on a concrete backend.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use picshare_core::models::{FileInfo, ImageFileMetadata};
use picshare_core::AppError;
use thiserror::Error;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// An incoming file: its declared name and type plus a reader over the bytes.
pub struct FileUpload<'a> {
    pub filename: String,
    pub content_type: String,
    pub reader: &'a mut (dyn AsyncRead + Send + Unpin),
}

/// A stored file opened for reading.
pub struct LoadedFile {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub stream: ByteStream,
}

impl LoadedFile {
    /// Drain the stream into memory.
    pub async fn into_bytes(self) -> StorageResult<Vec<u8>> {
        let capacity = usize::try_from(self.size).unwrap_or(0);
        self.stream
            .try_fold(Vec::with_capacity(capacity), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}

impl std::fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Byte persistence for images, keyed by image id.
///
/// Writes replace any previous object for the same id and are never partially
/// visible: either the whole new object is readable or the old one still is.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Consume `upload` to EOF and store it under `image_id`.
    ///
    /// The returned size is the number of bytes actually written.
    async fn save(&self, image_id: Uuid, upload: FileUpload<'_>) -> StorageResult<FileInfo>;

    /// Open the bytes described by `file` for streaming.
    ///
    /// Fails with [`StorageError::NotFound`] if nothing is stored for `file.image_id`.
    async fn load(&self, file: &ImageFileMetadata) -> StorageResult<LoadedFile>;

    /// Remove the bytes stored under `image_id`.
    ///
    /// Fails with [`StorageError::NotFound`] if there is nothing to remove,
    /// including on a repeated delete.
    async fn delete(&self, image_id: Uuid) -> StorageResult<()>;

    async fn exists(&self, image_id: Uuid) -> StorageResult<bool>;

    fn backend_type(&self) -> StorageBackend;
}
