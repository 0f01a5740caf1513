use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use picshare_core::models::{FileInfo, ImageFileMetadata};
use tokio::fs;
use uuid::Uuid;

use crate::keys::{image_key, validate_key};
use crate::traits::{FileUpload, ImageStorage, LoadedFile, StorageError, StorageResult};
use crate::StorageBackend;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create the storage root (if needed) and return a handle to it.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    fn image_path(&self, image_id: Uuid) -> StorageResult<PathBuf> {
        self.key_to_path(&image_key(image_id))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Stream `upload` into `tmp_path`, flushed to disk. Returns bytes written.
    async fn write_temp(&self, tmp_path: &Path, upload: FileUpload<'_>) -> StorageResult<u64> {
        let mut file = fs::File::create(tmp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        let written = tokio::io::copy(upload.reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        Ok(written)
    }
}

#[async_trait]
impl ImageStorage for LocalStorage {
    async fn save(&self, image_id: Uuid, upload: FileUpload<'_>) -> StorageResult<FileInfo> {
        let path = self.image_path(image_id)?;
        self.ensure_parent_dir(&path).await?;

        let tmp_path = path.with_file_name(format!(".{}.{}.part", image_id, Uuid::new_v4()));
        let filename = upload.filename.clone();
        let content_type = upload.content_type.clone();
        let start = std::time::Instant::now();

        let written = match self.write_temp(&tmp_path, upload).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move file into place {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            image_id = %image_id,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(FileInfo {
            filename,
            content_type,
            size: written,
        })
    }

    async fn load(&self, file: &ImageFileMetadata) -> StorageResult<LoadedFile> {
        let path = self.image_path(file.image_id)?;

        let handle = match fs::File::open(&path).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(image_key(file.image_id)));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let size = handle.metadata().await?.len();

        let image_id = file.image_id;
        let stream = tokio_util::io::ReaderStream::new(handle).map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(image_id = %image_id, error = %e, "Local storage stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        tracing::debug!(path = %path.display(), size_bytes = size, "Local storage load");

        Ok(LoadedFile {
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            size,
            stream: Box::pin(stream),
        })
    }

    async fn delete(&self, image_id: Uuid) -> StorageResult<()> {
        let path = self.image_path(image_id)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(image_key(image_id)));
            }
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        tracing::info!(
            path = %path.display(),
            image_id = %image_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, image_id: Uuid) -> StorageResult<bool> {
        let path = self.image_path(image_id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
