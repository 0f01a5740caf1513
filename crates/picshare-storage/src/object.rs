use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use picshare_core::models::{FileInfo, ImageFileMetadata};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::keys::image_key;
use crate::traits::{FileUpload, ImageStorage, LoadedFile, StorageError, StorageResult};
use crate::StorageBackend;

/// Storage on top of any [`ObjectStore`]: S3 and compatible providers in
/// production, `InMemory` in tests.
///
/// A single `put` replaces the object atomically, so readers never observe a
/// partially written image.
#[derive(Debug)]
pub struct ObjectStorage<S> {
    store: S,
    backend: StorageBackend,
}

impl ObjectStorage<AmazonS3> {
    /// Build an S3-backed store.
    ///
    /// `endpoint_url` is for S3-compatible providers such as MinIO
    /// (`http://localhost:9000`); plain HTTP is allowed only when the endpoint uses it.
    pub fn s3(bucket: &str, region: &str, endpoint_url: Option<&str>) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket);

        if let Some(endpoint) = endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(ObjectStorage {
            store,
            backend: StorageBackend::S3,
        })
    }
}

impl<S: ObjectStore> ObjectStorage<S> {
    /// Wrap an already configured store.
    pub fn with_store(store: S, backend: StorageBackend) -> Self {
        ObjectStorage { store, backend }
    }

    fn location(image_id: Uuid) -> Path {
        Path::from(image_key(image_id))
    }

    fn map_error(image_id: Uuid, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(image_key(image_id)),
            other => StorageError::BackendError(other.to_string()),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ImageStorage for ObjectStorage<S> {
    async fn save(&self, image_id: Uuid, upload: FileUpload<'_>) -> StorageResult<FileInfo> {
        let start = std::time::Instant::now();
        let mut data = Vec::new();
        upload
            .reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read upload: {}", e)))?;
        let size = data.len() as u64;

        let location = Self::location(image_id);
        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %location,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store save failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            key = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store save successful"
        );

        Ok(FileInfo {
            filename: upload.filename,
            content_type: upload.content_type,
            size,
        })
    }

    async fn load(&self, file: &ImageFileMetadata) -> StorageResult<LoadedFile> {
        let image_id = file.image_id;
        let result = self
            .store
            .get(&Self::location(image_id))
            .await
            .map_err(|e| Self::map_error(image_id, e))?;
        let size = result.meta.size;

        let stream = result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(image_id = %image_id, error = %e, "Object store stream read error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(LoadedFile {
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            size,
            stream: Box::pin(stream),
        })
    }

    async fn delete(&self, image_id: Uuid) -> StorageResult<()> {
        let location = Self::location(image_id);

        // Object store deletes succeed on missing keys; check first so absence is reported.
        self.store
            .head(&location)
            .await
            .map_err(|e| Self::map_error(image_id, e))?;

        self.store
            .delete(&location)
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        tracing::info!(key = %location, "Object store delete successful");
        Ok(())
    }

    async fn exists(&self, image_id: Uuid) -> StorageResult<bool> {
        match self.store.head(&Self::location(image_id)).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn storage() -> ObjectStorage<InMemory> {
        ObjectStorage::with_store(InMemory::new(), StorageBackend::S3)
    }

    fn metadata_for(image_id: Uuid) -> ImageFileMetadata {
        ImageFileMetadata {
            image_id,
            filename: "cat.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 0,
            width: None,
            height: None,
            dominant_color: None,
            average_color: None,
            palette: Vec::new(),
            revision: 1,
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_object_store() {
        let storage = storage();
        let image_id = Uuid::new_v4();
        let data = b"\xff\xd8\xff not really a jpeg".to_vec();

        let mut reader = data.as_slice();
        let info = storage
            .save(
                image_id,
                FileUpload {
                    filename: "cat.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    reader: &mut reader,
                },
            )
            .await
            .unwrap();
        assert_eq!(info.size, data.len() as u64);

        let loaded = storage.load(&metadata_for(image_id)).await.unwrap();
        assert_eq!(loaded.filename, "cat.jpg");
        assert_eq!(loaded.into_bytes().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let storage = storage();
        let image_id = Uuid::new_v4();

        assert!(matches!(
            storage.load(&metadata_for(image_id)).await.unwrap_err(),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            storage.delete(image_id).await.unwrap_err(),
            StorageError::NotFound(_)
        ));
        assert!(!storage.exists(image_id).await.unwrap());
    }
}
