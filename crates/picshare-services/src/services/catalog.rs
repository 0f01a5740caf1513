//! Catalog Service
//!
//! CRUD, listing and likes over images. File writes go through the
//! [`MetadataReconciler`]; reads go straight to the repository and storage.

use std::sync::Arc;

use picshare_core::models::{
    Image, ImageDetails, ImageFileMetadata, ImageFilter, ImageUpdate, NewImage, Page, Pagination,
    User,
};
use picshare_core::AppError;
use picshare_db::ImageRepository;
use picshare_storage::{FileUpload, ImageStorage, LoadedFile, StorageError};
use uuid::Uuid;
use validator::Validate;

use super::reconciler::MetadataReconciler;

fn image_not_found() -> AppError {
    AppError::NotFound("Image not found".to_string())
}

#[derive(Clone)]
pub struct CatalogService {
    images: ImageRepository,
    storage: Arc<dyn ImageStorage>,
    reconciler: MetadataReconciler,
}

impl CatalogService {
    pub fn new(
        images: ImageRepository,
        storage: Arc<dyn ImageStorage>,
        reconciler: MetadataReconciler,
    ) -> Self {
        Self {
            images,
            storage,
            reconciler,
        }
    }

    /// Store a new image. The returned details carry the synchronous file
    /// fields; visual fields are filled in later by the background step.
    #[tracing::instrument(skip(self, upload), fields(owner_id = new_image.owner_id))]
    pub async fn create(
        &self,
        new_image: &NewImage,
        upload: FileUpload<'_>,
    ) -> Result<ImageDetails, AppError> {
        new_image.validate()?;
        let image_id = Uuid::new_v4();

        let (image, file) = self.reconciler.save_new(image_id, new_image, upload).await?;
        tracing::info!(
            image_id = %image.id,
            size_bytes = file.size,
            content_type = %file.content_type,
            "Image created"
        );

        self.get(image.id).await
    }

    pub async fn get(&self, image_id: Uuid) -> Result<ImageDetails, AppError> {
        self.images
            .get_details(image_id)
            .await?
            .ok_or_else(image_not_found)
    }

    pub async fn list(
        &self,
        filter: &ImageFilter,
        pagination: Pagination,
    ) -> Result<Page<ImageDetails>, AppError> {
        if let (Some(gte), Some(lte)) = (filter.created_at_gte, filter.created_at_lte) {
            if gte > lte {
                return Err(AppError::InvalidInput(
                    "created_at__gte must not be after created_at__lte".to_string(),
                ));
            }
        }
        let (items, total) = self.images.list(filter, pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Load the image and check that `actor` may change it: owners and admins only.
    pub async fn authorize_mutation(&self, image_id: Uuid, actor: &User) -> Result<Image, AppError> {
        let image = self
            .images
            .get_image(image_id)
            .await?
            .ok_or_else(image_not_found)?;

        if actor.is_admin() || image.owner_id == Some(actor.id) {
            Ok(image)
        } else {
            Err(AppError::Forbidden(
                "Only the owner or an admin can modify this image".to_string(),
            ))
        }
    }

    /// Partial update: only provided fields change.
    pub async fn update(&self, image_id: Uuid, update: &ImageUpdate) -> Result<ImageDetails, AppError> {
        update.validate()?;
        if !update.is_empty() {
            self.images
                .update_image(image_id, update)
                .await?
                .ok_or_else(image_not_found)?;
        }
        self.get(image_id).await
    }

    /// Replace the stored bytes of an existing image and reset its visual fields.
    #[tracing::instrument(skip(self, upload), fields(image_id = %image_id))]
    pub async fn replace_file(
        &self,
        image_id: Uuid,
        upload: FileUpload<'_>,
    ) -> Result<ImageFileMetadata, AppError> {
        // Checked before touching storage so an unknown id never writes bytes.
        if self.images.get_image(image_id).await?.is_none() {
            return Err(image_not_found());
        }

        let file = self.reconciler.save_replacement(image_id, upload).await?;
        tracing::info!(image_id = %image_id, size_bytes = file.size, "Image file replaced");

        self.images
            .get_file(image_id)
            .await?
            .ok_or_else(image_not_found)
    }

    /// Delete the catalog rows, then the stored bytes.
    ///
    /// Bytes that cannot be removed after the rows are gone are reported as
    /// [`AppError::Integrity`]; bytes already missing are only logged.
    #[tracing::instrument(skip(self), fields(image_id = %image_id))]
    pub async fn delete(&self, image_id: Uuid) -> Result<(), AppError> {
        if !self.images.delete_image(image_id).await? {
            return Err(image_not_found());
        }

        match self.storage.delete(image_id).await {
            Ok(()) => {
                tracing::info!(image_id = %image_id, "Image deleted");
                Ok(())
            }
            Err(StorageError::NotFound(key)) => {
                tracing::warn!(image_id = %image_id, key = %key, "Image deleted, stored bytes were already missing");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    image_id = %image_id,
                    error = %e,
                    "Image removed from catalog but stored bytes could not be deleted"
                );
                Err(AppError::Integrity(format!(
                    "Image {} removed from catalog but its stored bytes could not be deleted: {}",
                    image_id, e
                )))
            }
        }
    }

    /// Like an image. Liking twice is a no-op.
    pub async fn like(&self, image_id: Uuid, user_id: i64) -> Result<(), AppError> {
        self.images.add_like(image_id, user_id).await
    }

    /// Remove a like. Fails with `NotFound` if the user had not liked the image.
    pub async fn unlike(&self, image_id: Uuid, user_id: i64) -> Result<(), AppError> {
        if !self.images.remove_like(image_id, user_id).await? {
            return Err(AppError::NotFound("Like not found".to_string()));
        }
        Ok(())
    }

    /// Open the stored bytes of an image for download.
    pub async fn open_file(&self, image_id: Uuid) -> Result<LoadedFile, AppError> {
        let file = self
            .images
            .get_file(image_id)
            .await?
            .ok_or_else(image_not_found)?;
        Ok(self.storage.load(&file).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use picshare_core::models::{ImageOrder, Role};
    use picshare_db::UserRepository;
    use picshare_processing::VisualFeatureExtractor;
    use picshare_storage::LocalStorage;
    use picshare_worker::{BackgroundTask, TaskQueue, TaskQueueConfig};
    use tokio::sync::oneshot;

    struct Harness {
        catalog: CatalogService,
        storage: Arc<dyn ImageStorage>,
        tasks: TaskQueue,
        users: UserRepository,
        owner: User,
        _dir: tempfile::TempDir,
    }

    async fn harness(max_workers: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
        let pool = picshare_db::connect(&url, 4, Duration::from_secs(5)).await.unwrap();
        let storage: Arc<dyn ImageStorage> =
            Arc::new(LocalStorage::new(dir.path().join("storage")).await.unwrap());
        let tasks = TaskQueue::new(TaskQueueConfig {
            max_workers,
            ..Default::default()
        });
        let images = ImageRepository::new(pool.clone());
        let users = UserRepository::new(pool);
        let owner = users.create("owner", "hash", Role::User).await.unwrap();

        let reconciler = MetadataReconciler::new(
            storage.clone(),
            images.clone(),
            VisualFeatureExtractor::new(5),
            tasks.clone(),
            1024,
        );
        Harness {
            catalog: CatalogService::new(images, storage.clone(), reconciler),
            storage,
            tasks,
            users,
            owner,
            _dir: dir,
        }
    }

    /// Occupies a worker until released.
    struct Gate(oneshot::Receiver<()>);

    #[async_trait]
    impl BackgroundTask for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn run(self: Box<Self>) -> anyhow::Result<()> {
            let _ = self.0.await;
            Ok(())
        }
    }

    fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn red_jpeg() -> Vec<u8> {
        encode(RgbImage::from_pixel(10, 10, Rgb([255, 0, 0])), ImageFormat::Jpeg)
    }

    fn blue_png() -> Vec<u8> {
        encode(RgbImage::from_pixel(4, 3, Rgb([0, 0, 255])), ImageFormat::Png)
    }

    fn new_image(owner: &User, title: &str) -> NewImage {
        NewImage {
            owner_id: owner.id,
            title: title.to_string(),
            description: Some("a test image".to_string()),
        }
    }

    async fn create(h: &Harness, title: &str, data: &[u8], content_type: &str) -> ImageDetails {
        let mut reader = data;
        h.catalog
            .create(
                &new_image(&h.owner, title),
                FileUpload {
                    filename: format!("{}.bin", title),
                    content_type: content_type.to_string(),
                    reader: &mut reader,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_visual_fields_arrive_after_background_step() {
        let h = harness(1).await;
        let (release, gate) = oneshot::channel();
        h.tasks.submit(Box::new(Gate(gate))).await.unwrap();

        let data = red_jpeg();
        let created = create(&h, "red", &data, "image/jpeg").await;

        let before = h.catalog.get(created.id).await.unwrap();
        assert_eq!(before.file.filename, "red.bin");
        assert_eq!(before.file.content_type, "image/jpeg");
        assert_eq!(before.file.size, data.len() as i64);
        assert!(before.file.width.is_none());
        assert!(before.file.height.is_none());
        assert!(before.file.dominant_color.is_none());
        assert!(before.file.average_color.is_none());
        assert!(before.file.palette.is_empty());

        release.send(()).unwrap();
        assert!(h.tasks.wait_idle_timeout(Duration::from_secs(10)).await);

        let after = h.catalog.get(created.id).await.unwrap();
        assert_eq!(after.file.width, Some(10));
        assert_eq!(after.file.height, Some(10));
        let dominant = after.file.dominant_color.unwrap().rgb();
        let average = after.file.average_color.unwrap().rgb();
        for [r, g, b] in [dominant, average] {
            assert!(r > 240 && g < 16 && b < 16, "not red: {:?}", [r, g, b]);
        }
        assert_eq!(after.file.palette.len(), 1);
    }

    #[tokio::test]
    async fn test_solid_png_features_are_exact() {
        let h = harness(2).await;
        let created = create(&h, "blue", &blue_png(), "image/png").await;
        h.tasks.wait_idle().await;

        let details = h.catalog.get(created.id).await.unwrap();
        assert_eq!((details.file.width, details.file.height), (Some(4), Some(3)));
        assert_eq!(details.file.dominant_color.unwrap().as_str(), "#0000ff");
        assert_eq!(details.file.average_color.unwrap().as_str(), "#0000ff");
        assert_eq!(details.file.palette.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_upload_keeps_null_visuals() {
        let h = harness(2).await;
        let created = create(&h, "text", b"this is not an image", "image/png").await;
        h.tasks.wait_idle().await;

        let details = h.catalog.get(created.id).await.unwrap();
        assert_eq!(details.file.size, 20);
        assert!(!details.file.has_visual_features());
        assert!(details.file.palette.is_empty());
    }

    #[tokio::test]
    async fn test_replace_file_recomputes_features() {
        let h = harness(2).await;
        let created = create(&h, "swap", &red_jpeg(), "image/jpeg").await;
        h.tasks.wait_idle().await;

        let png = blue_png();
        let mut reader = png.as_slice();
        let file = h
            .catalog
            .replace_file(
                created.id,
                FileUpload {
                    filename: "blue.png".to_string(),
                    content_type: "image/png".to_string(),
                    reader: &mut reader,
                },
            )
            .await
            .unwrap();
        assert_eq!(file.filename, "blue.png");
        assert_eq!(file.size, png.len() as i64);

        h.tasks.wait_idle().await;
        let details = h.catalog.get(created.id).await.unwrap();
        assert_eq!(details.file.dominant_color.unwrap().as_str(), "#0000ff");
        assert_eq!(details.file.width, Some(4));

        let bytes = h.catalog.open_file(created.id).await.unwrap().into_bytes().await.unwrap();
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn test_replace_file_of_unknown_image_writes_nothing() {
        let h = harness(1).await;
        let id = Uuid::new_v4();
        let mut reader: &[u8] = b"bytes";
        let err = h
            .catalog
            .replace_file(
                id,
                FileUpload {
                    filename: "x.png".to_string(),
                    content_type: "image/png".to_string(),
                    reader: &mut reader,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!h.storage.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_and_removes_bytes() {
        let h = harness(2).await;
        let created = create(&h, "gone", &blue_png(), "image/png").await;
        h.tasks.wait_idle().await;
        h.catalog.like(created.id, h.owner.id).await.unwrap();

        h.catalog.delete(created.id).await.unwrap();

        assert!(matches!(h.catalog.get(created.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            h.catalog.open_file(created.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(!h.storage.exists(created.id).await.unwrap());
        assert!(matches!(
            h.catalog.unlike(created.id, h.owner.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(h.catalog.delete(created.id).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_racing_extraction_is_harmless() {
        let h = harness(1).await;
        let (release, gate) = oneshot::channel();
        h.tasks.submit(Box::new(Gate(gate))).await.unwrap();

        let created = create(&h, "race", &blue_png(), "image/png").await;
        h.catalog.delete(created.id).await.unwrap();

        release.send(()).unwrap();
        assert!(h.tasks.wait_idle_timeout(Duration::from_secs(10)).await);
        assert!(matches!(h.catalog.get(created.id).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_like_is_idempotent_and_unlike_is_strict() {
        let h = harness(1).await;
        let created = create(&h, "liked", &blue_png(), "image/png").await;

        h.catalog.like(created.id, h.owner.id).await.unwrap();
        h.catalog.like(created.id, h.owner.id).await.unwrap();
        let details = h.catalog.get(created.id).await.unwrap();
        assert_eq!(details.likes, 1);
        assert_eq!(details.liked_by, vec![h.owner.id]);

        let stranger = h.users.create("stranger", "hash", Role::User).await.unwrap();
        assert!(matches!(
            h.catalog.unlike(created.id, stranger.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        h.catalog.unlike(created.id, h.owner.id).await.unwrap();
        assert_eq!(h.catalog.get(created.id).await.unwrap().likes, 0);

        assert!(matches!(
            h.catalog.like(Uuid::new_v4(), h.owner.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_and_authorization() {
        let h = harness(1).await;
        let created = create(&h, "before", &blue_png(), "image/png").await;

        let updated = h
            .catalog
            .update(
                created.id,
                &ImageUpdate {
                    title: Some("after".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "after");
        assert_eq!(updated.description.as_deref(), Some("a test image"));

        let stranger = h.users.create("stranger", "hash", Role::User).await.unwrap();
        let admin = h.users.create("admin", "hash", Role::Admin).await.unwrap();
        assert!(h.catalog.authorize_mutation(created.id, &h.owner).await.is_ok());
        assert!(h.catalog.authorize_mutation(created.id, &admin).await.is_ok());
        assert!(matches!(
            h.catalog.authorize_mutation(created.id, &stranger).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            h.catalog.update(Uuid::new_v4(), &ImageUpdate { title: Some("x".into()), description: None }).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_pages_and_validates_range() {
        let h = harness(1).await;
        for title in ["one", "two", "three"] {
            create(&h, title, &blue_png(), "image/png").await;
        }

        let filter = ImageFilter {
            order_by: ImageOrder::parse_list("title").unwrap(),
            ..Default::default()
        };
        let page = h.catalog.list(&filter, Pagination::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
        let titles: Vec<&str> = page.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "three"]);

        let now = chrono::Utc::now();
        let inverted = ImageFilter {
            created_at_gte: Some(now),
            created_at_lte: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            h.catalog.list(&inverted, Pagination::default()).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }
}
