//! Save -> commit -> extract -> persist, for one image file.
//!
//! Bytes are stored and the synchronous file fields committed before the
//! caller gets a response. Visual features are computed afterwards on the
//! task queue from a spooled copy of the upload, and written back only if the
//! file has not been replaced since (see `ImageRepository::apply_visual_features`).

use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use picshare_core::models::{FileInfo, Image, NewImage};
use picshare_core::AppError;
use picshare_db::ImageRepository;
use picshare_processing::{ExtractionError, VisualFeatureExtractor};
use picshare_storage::{FileUpload, ImageStorage, StorageError};
use picshare_worker::{BackgroundTask, TaskQueue};
use tempfile::SpooledTempFile;
use uuid::Uuid;

use super::spool::SpoolingReader;

/// Catalog change that accompanies a file write.
#[derive(Debug, Clone, Copy)]
enum CatalogWrite<'a> {
    Insert(&'a NewImage),
    Replace,
}

#[derive(Clone)]
pub struct MetadataReconciler {
    storage: Arc<dyn ImageStorage>,
    images: ImageRepository,
    extractor: VisualFeatureExtractor,
    tasks: TaskQueue,
    spool_max_memory_bytes: usize,
}

impl MetadataReconciler {
    pub fn new(
        storage: Arc<dyn ImageStorage>,
        images: ImageRepository,
        extractor: VisualFeatureExtractor,
        tasks: TaskQueue,
        spool_max_memory_bytes: usize,
    ) -> Self {
        Self {
            storage,
            images,
            extractor,
            tasks,
            spool_max_memory_bytes,
        }
    }

    /// Store the bytes of a new image and insert its catalog rows.
    pub async fn save_new(
        &self,
        image_id: Uuid,
        new_image: &NewImage,
        upload: FileUpload<'_>,
    ) -> Result<(Image, FileInfo), AppError> {
        let (image, file) = self
            .reconcile(image_id, upload, CatalogWrite::Insert(new_image))
            .await?;
        let image = image.ok_or_else(|| AppError::Internal("Image insert returned no row".to_string()))?;
        Ok((image, file))
    }

    /// Overwrite the bytes of an existing image and reset its file metadata.
    pub async fn save_replacement(
        &self,
        image_id: Uuid,
        upload: FileUpload<'_>,
    ) -> Result<FileInfo, AppError> {
        let (_, file) = self.reconcile(image_id, upload, CatalogWrite::Replace).await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self, upload), fields(image_id = %image_id, filename = %upload.filename))]
    async fn reconcile(
        &self,
        image_id: Uuid,
        upload: FileUpload<'_>,
        write: CatalogWrite<'_>,
    ) -> Result<(Option<Image>, FileInfo), AppError> {
        let FileUpload {
            filename,
            content_type,
            reader,
        } = upload;
        let mut spooling = SpoolingReader::new(reader, self.spool_max_memory_bytes);

        let file = self
            .storage
            .save(
                image_id,
                FileUpload {
                    filename,
                    content_type,
                    reader: &mut spooling,
                },
            )
            .await?;
        let spool = spooling.finish().await;

        let committed = match write {
            CatalogWrite::Insert(new_image) => self
                .images
                .insert_image_with_file(image_id, new_image, &file)
                .await
                .map(|(image, revision)| (Some(image), revision)),
            CatalogWrite::Replace => self
                .images
                .replace_file(image_id, &file)
                .await
                .map(|revision| (None, revision)),
        };

        let (image, revision) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                self.discard_uncommitted(image_id, write, &e).await;
                return Err(e);
            }
        };

        match spool {
            Ok(spool) => self.schedule_extraction(image_id, revision, spool).await,
            Err(e) => tracing::warn!(
                image_id = %image_id,
                error = %e,
                "Upload copy unavailable, visual features will stay empty"
            ),
        }

        Ok((image, file))
    }

    /// Undo the byte write when the catalog refused the file.
    async fn discard_uncommitted(&self, image_id: Uuid, write: CatalogWrite<'_>, cause: &AppError) {
        match write {
            CatalogWrite::Insert(_) => match self.storage.delete(image_id).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    tracing::warn!(image_id = %image_id, error = %cause, "Catalog insert failed, stored bytes removed");
                }
                Err(e) => {
                    tracing::error!(
                        image_id = %image_id,
                        error = %e,
                        cause = %cause,
                        "Catalog insert failed and stored bytes could not be removed"
                    );
                }
            },
            // The previous bytes are already overwritten; nothing to roll back to.
            CatalogWrite::Replace => {
                tracing::error!(
                    image_id = %image_id,
                    error = %cause,
                    "File replaced in storage but catalog update failed"
                );
            }
        }
    }

    async fn schedule_extraction(&self, image_id: Uuid, revision: i64, spool: SpooledTempFile) {
        let task = ExtractVisualFeatures {
            image_id,
            revision,
            spool,
            extractor: self.extractor,
            images: self.images.clone(),
        };
        if let Err(e) = self.tasks.submit(Box::new(task)).await {
            tracing::warn!(
                image_id = %image_id,
                error = %e,
                "Could not schedule visual feature extraction"
            );
        }
    }
}

/// Background half of the reconcile sequence.
struct ExtractVisualFeatures {
    image_id: Uuid,
    revision: i64,
    spool: SpooledTempFile,
    extractor: VisualFeatureExtractor,
    images: ImageRepository,
}

#[async_trait]
impl BackgroundTask for ExtractVisualFeatures {
    fn name(&self) -> &'static str {
        "extract_visual_features"
    }

    async fn run(self: Box<Self>) -> anyhow::Result<()> {
        let ExtractVisualFeatures {
            image_id,
            revision,
            mut spool,
            extractor,
            images,
        } = *self;
        let start = Instant::now();

        let extracted = tokio::task::spawn_blocking(move || {
            spool
                .seek(SeekFrom::Start(0))
                .map_err(|e| ExtractionError::CorruptImageData(e.to_string()))?;
            extractor.extract(BufReader::new(spool))
        })
        .await
        .context("Extraction worker panicked")?;

        let features = match extracted {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(
                    image_id = %image_id,
                    revision,
                    error = %e,
                    "Visual feature extraction failed, visual fields stay empty"
                );
                return Ok(());
            }
        };

        let applied = images
            .apply_visual_features(image_id, revision, &features)
            .await
            .with_context(|| format!("Failed to store visual features for image {}", image_id))?;

        if applied {
            tracing::info!(
                image_id = %image_id,
                revision,
                width = features.width,
                height = features.height,
                dominant_color = %features.dominant_color,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Visual features stored"
            );
        } else {
            tracing::info!(
                image_id = %image_id,
                revision,
                "Image file changed or was deleted during extraction, result discarded"
            );
        }
        Ok(())
    }
}
