use std::collections::HashMap;

use chrono::{DateTime, Utc};
use picshare_core::models::{
    FileInfo, HexColor, Image, ImageDetails, ImageFileMetadata, ImageFilter, ImageSortField,
    ImageUpdate, NewImage, Pagination, UserSummary, VisualFeatures,
};
use picshare_core::AppError;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const DETAILS_SELECT: &str = r#"
    SELECT i.id, i.owner_id, u.username AS owner_username, i.title, i.description, i.created_at,
           f.filename, f.content_type, f.size, f.width, f.height,
           f.dominant_color, f.average_color, f.revision,
           (SELECT COUNT(*) FROM image_likes l WHERE l.image_id = i.id) AS likes
    FROM images i
    JOIN image_files f ON f.image_id = i.id
    LEFT JOIN users u ON u.id = i.owner_id
"#;

#[derive(Debug, FromRow)]
struct ImageDetailsRow {
    id: Uuid,
    owner_id: Option<i64>,
    owner_username: Option<String>,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    filename: String,
    content_type: String,
    size: i64,
    width: Option<i64>,
    height: Option<i64>,
    dominant_color: Option<HexColor>,
    average_color: Option<HexColor>,
    revision: i64,
    likes: i64,
}

impl ImageDetailsRow {
    fn into_details(self, palette: Vec<HexColor>, liked_by: Vec<i64>) -> ImageDetails {
        let owner = match (self.owner_id, self.owner_username) {
            (Some(id), Some(username)) => Some(UserSummary { id, username }),
            _ => None,
        };
        ImageDetails {
            id: self.id,
            owner,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            file: ImageFileMetadata {
                image_id: self.id,
                filename: self.filename,
                content_type: self.content_type,
                size: self.size,
                width: self.width,
                height: self.height,
                dominant_color: self.dominant_color,
                average_color: self.average_color,
                palette,
                revision: self.revision,
            },
            likes: self.likes,
            liked_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct FileRow {
    image_id: Uuid,
    filename: String,
    content_type: String,
    size: i64,
    width: Option<i64>,
    height: Option<i64>,
    dominant_color: Option<HexColor>,
    average_color: Option<HexColor>,
    revision: i64,
}

#[derive(Debug, FromRow)]
struct PaletteRow {
    image_id: Uuid,
    color: HexColor,
}

#[derive(Debug, FromRow)]
struct LikeRow {
    image_id: Uuid,
    user_id: i64,
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a ImageFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(owner_id) = filter.owner_id {
        builder.push(" AND i.owner_id = ").push_bind(owner_id);
    }
    if let Some(gte) = filter.created_at_gte {
        builder.push(" AND i.created_at >= ").push_bind(gte);
    }
    if let Some(lte) = filter.created_at_lte {
        builder.push(" AND i.created_at <= ").push_bind(lte);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (LOWER(i.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(COALESCE(i.description, '')) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ImageFilter) {
    builder.push(" ORDER BY ");
    if filter.order_by.is_empty() {
        builder.push("i.created_at DESC, i.id ASC");
        return;
    }
    let mut has_id = false;
    for (n, order) in filter.order_by.iter().enumerate() {
        if n > 0 {
            builder.push(", ");
        }
        builder
            .push(order.field.column())
            .push(if order.descending { " DESC" } else { " ASC" });
        has_id |= order.field == ImageSortField::Id;
    }
    // Unique tie-break so pages never overlap.
    if !has_id {
        builder.push(", i.id ASC");
    }
}

/// Repository for the image catalog: images, their file metadata, palettes and likes.
#[derive(Clone)]
pub struct ImageRepository {
    pool: SqlitePool,
}

impl ImageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an image and its file metadata atomically.
    ///
    /// Visual fields start out NULL at revision 1.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "insert", db.record_id = %image_id))]
    pub async fn insert_image_with_file(
        &self,
        image_id: Uuid,
        new_image: &NewImage,
        file: &FileInfo,
    ) -> Result<(Image, i64), AppError> {
        let size = i64::try_from(file.size)
            .map_err(|_| AppError::InvalidInput("File too large".to_string()))?;
        let mut tx = self.pool.begin().await?;

        let image = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (id, owner_id, title, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, owner_id, title, description, created_at
            "#,
        )
        .bind(image_id)
        .bind(new_image.owner_id)
        .bind(&new_image.title)
        .bind(&new_image.description)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let revision = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO image_files (image_id, filename, content_type, size, revision)
            VALUES (?, ?, ?, ?, 1)
            RETURNING revision
            "#,
        )
        .bind(image_id)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(size)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((image, revision))
    }

    /// Point an existing image at newly stored bytes.
    ///
    /// Bumps the revision, clears visual fields and drops the palette so stale
    /// features are never shown for the new file. Returns the new revision.
    #[tracing::instrument(skip(self), fields(db.table = "image_files", db.operation = "upsert", db.record_id = %image_id))]
    pub async fn replace_file(&self, image_id: Uuid, file: &FileInfo) -> Result<i64, AppError> {
        let size = i64::try_from(file.size)
            .map_err(|_| AppError::InvalidInput("File too large".to_string()))?;
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM images WHERE id = ?)")
            .bind(image_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Image not found".to_string()));
        }

        let revision = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO image_files (image_id, filename, content_type, size, revision)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT (image_id) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size = excluded.size,
                width = NULL,
                height = NULL,
                dominant_color = NULL,
                average_color = NULL,
                revision = image_files.revision + 1
            RETURNING revision
            "#,
        )
        .bind(image_id)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(size)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM image_palette_colors WHERE image_id = ?")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(revision)
    }

    /// Record extracted features, but only if the file is still at `revision`.
    ///
    /// Returns `false` when the file was replaced or the image deleted in the
    /// meantime; nothing is written in that case. The palette is replaced
    /// wholesale.
    #[tracing::instrument(skip(self, features), fields(db.table = "image_files", db.operation = "update", db.record_id = %image_id))]
    pub async fn apply_visual_features(
        &self,
        image_id: Uuid,
        revision: i64,
        features: &VisualFeatures,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE image_files
            SET width = ?, height = ?, dominant_color = ?, average_color = ?
            WHERE image_id = ? AND revision = ?
            "#,
        )
        .bind(i64::from(features.width))
        .bind(i64::from(features.height))
        .bind(&features.dominant_color)
        .bind(&features.average_color)
        .bind(image_id)
        .bind(revision)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM image_palette_colors WHERE image_id = ?")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        for (position, color) in features.palette.iter().enumerate() {
            sqlx::query("INSERT INTO image_palette_colors (image_id, position, color) VALUES (?, ?, ?)")
                .bind(image_id)
                .bind(position as i64)
                .bind(color)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select", db.record_id = %image_id))]
    pub async fn get_image(&self, image_id: Uuid) -> Result<Option<Image>, AppError> {
        let image = sqlx::query_as::<_, Image>(
            "SELECT id, owner_id, title, description, created_at FROM images WHERE id = ?",
        )
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    #[tracing::instrument(skip(self), fields(db.table = "image_files", db.operation = "select", db.record_id = %image_id))]
    pub async fn get_file(&self, image_id: Uuid) -> Result<Option<ImageFileMetadata>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT image_id, filename, content_type, size, width, height,
                   dominant_color, average_color, revision
            FROM image_files
            WHERE image_id = ?
            "#,
        )
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut palettes = self.palettes_for(&[image_id]).await?;

        Ok(Some(ImageFileMetadata {
            image_id: row.image_id,
            filename: row.filename,
            content_type: row.content_type,
            size: row.size,
            width: row.width,
            height: row.height,
            dominant_color: row.dominant_color,
            average_color: row.average_color,
            palette: palettes.remove(&image_id).unwrap_or_default(),
            revision: row.revision,
        }))
    }

    /// Image with owner, file metadata, palette and likes.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select", db.record_id = %image_id))]
    pub async fn get_details(&self, image_id: Uuid) -> Result<Option<ImageDetails>, AppError> {
        let row = sqlx::query_as::<_, ImageDetailsRow>(&format!("{} WHERE i.id = ?", DETAILS_SELECT))
            .bind(image_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.expand(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Filtered, ordered page of images plus the total number of matches.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select"))]
    pub async fn list(
        &self,
        filter: &ImageFilter,
        pagination: Pagination,
    ) -> Result<(Vec<ImageDetails>, i64), AppError> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM images i JOIN image_files f ON f.image_id = i.id",
        );
        push_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new(DETAILS_SELECT);
        push_filters(&mut query, filter);
        push_order(&mut query, filter);
        query
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = query
            .build_query_as::<ImageDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((self.expand(rows).await?, total))
    }

    /// Update title and/or description. Returns `None` for unknown ids.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %image_id))]
    pub async fn update_image(
        &self,
        image_id: Uuid,
        update: &ImageUpdate,
    ) -> Result<Option<Image>, AppError> {
        let image = sqlx::query_as::<_, Image>(
            r#"
            UPDATE images
            SET title = COALESCE(?, title),
                description = COALESCE(?, description)
            WHERE id = ?
            RETURNING id, owner_id, title, description, created_at
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    /// Delete an image; its file metadata, palette and likes cascade.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "delete", db.record_id = %image_id))]
    pub async fn delete_image(&self, image_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(image_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that `user_id` likes `image_id`. Liking twice is a no-op.
    #[tracing::instrument(skip(self), fields(db.table = "image_likes", db.operation = "insert", db.record_id = %image_id))]
    pub async fn add_like(&self, image_id: Uuid, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM images WHERE id = ?)")
            .bind(image_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Image not found".to_string()));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO image_likes (user_id, image_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(image_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a like. Returns `false` if there was none.
    #[tracing::instrument(skip(self), fields(db.table = "image_likes", db.operation = "delete", db.record_id = %image_id))]
    pub async fn remove_like(&self, image_id: Uuid, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM image_likes WHERE user_id = ? AND image_id = ?")
            .bind(user_id)
            .bind(image_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach palettes and likers to detail rows, two queries per page.
    async fn expand(&self, rows: Vec<ImageDetailsRow>) -> Result<Vec<ImageDetails>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut palettes = self.palettes_for(&ids).await?;
        let mut likers = self.likers_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let palette = palettes.remove(&row.id).unwrap_or_default();
                let liked_by = likers.remove(&row.id).unwrap_or_default();
                row.into_details(palette, liked_by)
            })
            .collect())
    }

    async fn palettes_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<HexColor>>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT image_id, color FROM image_palette_colors WHERE image_id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY image_id, position");

        let rows = query.build_query_as::<PaletteRow>().fetch_all(&self.pool).await?;
        let mut palettes: HashMap<Uuid, Vec<HexColor>> = HashMap::new();
        for row in rows {
            palettes.entry(row.image_id).or_default().push(row.color);
        }
        Ok(palettes)
    }

    async fn likers_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<i64>>, AppError> {
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT image_id, user_id FROM image_likes WHERE image_id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY image_id, created_at, user_id");

        let rows = query.build_query_as::<LikeRow>().fetch_all(&self.pool).await?;
        let mut likers: HashMap<Uuid, Vec<i64>> = HashMap::new();
        for row in rows {
            likers.entry(row.image_id).or_default().push(row.user_id);
        }
        Ok(likers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::test_support::temp_pool;
    use crate::db::UserRepository;
    use picshare_core::models::{ImageOrder, Role};

    fn file(name: &str) -> FileInfo {
        FileInfo {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            size: 42,
        }
    }

    fn new_image(owner_id: i64, title: &str) -> NewImage {
        NewImage {
            owner_id,
            title: title.to_string(),
            description: None,
        }
    }

    fn red_features() -> VisualFeatures {
        VisualFeatures {
            width: 10,
            height: 10,
            dominant_color: "#ff0000".parse().unwrap(),
            average_color: "#ff0000".parse().unwrap(),
            palette: vec!["#ff0000".parse().unwrap()],
        }
    }

    async fn setup() -> (ImageRepository, UserRepository, i64, tempfile::TempDir) {
        let (pool, dir) = temp_pool().await;
        let users = UserRepository::new(pool.clone());
        let owner = users.create("alice", "hash", Role::User).await.unwrap();
        (ImageRepository::new(pool), users, owner.id, dir)
    }

    #[tokio::test]
    async fn test_insert_then_details_has_null_visuals() {
        let (repo, _users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        let (image, revision) = repo
            .insert_image_with_file(id, &new_image(owner, "sunset"), &file("a.png"))
            .await
            .unwrap();
        assert_eq!(image.id, id);
        assert_eq!(revision, 1);

        let details = repo.get_details(id).await.unwrap().unwrap();
        assert_eq!(details.owner.unwrap().username, "alice");
        assert_eq!(details.file.filename, "a.png");
        assert_eq!(details.file.size, 42);
        assert!(!details.file.has_visual_features());
        assert!(details.file.palette.is_empty());
        assert_eq!(details.likes, 0);
    }

    #[tokio::test]
    async fn test_visual_features_are_guarded_by_revision() {
        let (repo, _users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        repo.insert_image_with_file(id, &new_image(owner, "t"), &file("a.png"))
            .await
            .unwrap();

        let revision = repo.replace_file(id, &file("b.png")).await.unwrap();
        assert_eq!(revision, 2);

        // Result computed for the first file arrives late.
        assert!(!repo.apply_visual_features(id, 1, &red_features()).await.unwrap());
        let meta = repo.get_file(id).await.unwrap().unwrap();
        assert_eq!(meta.filename, "b.png");
        assert!(meta.width.is_none());

        assert!(repo.apply_visual_features(id, 2, &red_features()).await.unwrap());
        let meta = repo.get_file(id).await.unwrap().unwrap();
        assert_eq!(meta.width, Some(10));
        assert_eq!(meta.dominant_color.unwrap().as_str(), "#ff0000");
        assert_eq!(meta.palette.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_file_clears_features_and_palette() {
        let (repo, _users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        repo.insert_image_with_file(id, &new_image(owner, "t"), &file("a.png"))
            .await
            .unwrap();
        repo.apply_visual_features(id, 1, &red_features()).await.unwrap();

        repo.replace_file(id, &file("b.png")).await.unwrap();
        let meta = repo.get_file(id).await.unwrap().unwrap();
        assert!(meta.dominant_color.is_none());
        assert!(meta.palette.is_empty());
    }

    #[tokio::test]
    async fn test_replace_file_of_unknown_image_is_not_found() {
        let (repo, _users, _owner, _dir) = setup().await;
        let err = repo.replace_file(Uuid::new_v4(), &file("b.png")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (repo, users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        repo.insert_image_with_file(id, &new_image(owner, "t"), &file("a.png"))
            .await
            .unwrap();
        repo.apply_visual_features(id, 1, &red_features()).await.unwrap();
        let bob = users.create("bobby", "hash", Role::User).await.unwrap();
        repo.add_like(id, bob.id).await.unwrap();

        let count_rows = |table: &'static str| {
            let pool = repo.pool.clone();
            async move {
                let (count,): (i64,) =
                    sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE image_id = ?"))
                        .bind(id)
                        .fetch_one(&pool)
                        .await
                        .unwrap();
                count
            }
        };
        assert_eq!(count_rows("image_palette_colors").await, 1);
        assert_eq!(count_rows("image_likes").await, 1);

        assert!(repo.delete_image(id).await.unwrap());
        assert!(repo.get_details(id).await.unwrap().is_none());
        assert!(repo.get_file(id).await.unwrap().is_none());
        assert_eq!(count_rows("image_palette_colors").await, 0);
        assert_eq!(count_rows("image_likes").await, 0);
        assert!(!repo.delete_image(id).await.unwrap());
        assert!(!repo.remove_like(id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_likes_are_idempotent() {
        let (repo, _users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        repo.insert_image_with_file(id, &new_image(owner, "t"), &file("a.png"))
            .await
            .unwrap();

        repo.add_like(id, owner).await.unwrap();
        repo.add_like(id, owner).await.unwrap();
        let details = repo.get_details(id).await.unwrap().unwrap();
        assert_eq!(details.likes, 1);
        assert_eq!(details.liked_by, vec![owner]);

        assert!(repo.remove_like(id, owner).await.unwrap());
        assert!(!repo.remove_like(id, owner).await.unwrap());

        let err = repo.add_like(Uuid::new_v4(), owner).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleting_owner_keeps_image() {
        let (repo, users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        repo.insert_image_with_file(id, &new_image(owner, "t"), &file("a.png"))
            .await
            .unwrap();

        assert!(users.delete(owner).await.unwrap());
        let details = repo.get_details(id).await.unwrap().unwrap();
        assert!(details.owner.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_orders_and_paginates() {
        let (repo, users, owner, _dir) = setup().await;
        let other = users.create("carol", "hash", Role::User).await.unwrap();

        for (n, title) in ["Beach", "beach party", "Mountain"].iter().enumerate() {
            let owner_id = if n == 2 { other.id } else { owner };
            repo.insert_image_with_file(Uuid::new_v4(), &new_image(owner_id, title), &file("x.png"))
                .await
                .unwrap();
        }

        let (all, total) = repo.list(&ImageFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(total, 3);
        // Newest first by default.
        assert_eq!(all[0].title, "Mountain");

        let filter = ImageFilter {
            search: Some("BEACH".to_string()),
            order_by: ImageOrder::parse_list("title").unwrap(),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].title, "Beach");
        assert_eq!(items[1].title, "beach party");

        let filter = ImageFilter {
            owner_id: Some(other.id),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "Mountain");

        let (page2, total) = repo
            .list(&ImageFilter::default(), Pagination::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].title, "Beach");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (repo, _users, owner, _dir) = setup().await;
        repo.insert_image_with_file(Uuid::new_v4(), &new_image(owner, "100% real"), &file("x.png"))
            .await
            .unwrap();
        repo.insert_image_with_file(Uuid::new_v4(), &new_image(owner, "1000 real"), &file("y.png"))
            .await
            .unwrap();

        let filter = ImageFilter {
            search: Some("0%".to_string()),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "100% real");
    }

    #[tokio::test]
    async fn test_partial_update() {
        let (repo, _users, owner, _dir) = setup().await;
        let id = Uuid::new_v4();
        let mut new = new_image(owner, "old");
        new.description = Some("keep me".to_string());
        repo.insert_image_with_file(id, &new, &file("a.png")).await.unwrap();

        let update = ImageUpdate {
            title: Some("new".to_string()),
            description: None,
        };
        let image = repo.update_image(id, &update).await.unwrap().unwrap();
        assert_eq!(image.title, "new");
        assert_eq!(image.description.as_deref(), Some("keep me"));

        assert!(repo.update_image(Uuid::new_v4(), &update).await.unwrap().is_none());
    }
}
