use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::color::HexColor;
use super::user::UserSummary;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Catalog row for an image, without its file metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Image {
    pub id: Uuid,
    pub owner_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Synchronous file facts, known as soon as the bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Visual properties derived from the pixels of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VisualFeatures {
    pub width: u32,
    pub height: u32,
    pub dominant_color: HexColor,
    pub average_color: HexColor,
    /// Most significant colors first.
    pub palette: Vec<HexColor>,
}

/// File metadata attached one-to-one to an image.
///
/// The visual fields stay `None` until background extraction has run for the
/// current `revision` of the file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageFileMetadata {
    pub image_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub dominant_color: Option<HexColor>,
    pub average_color: Option<HexColor>,
    pub palette: Vec<HexColor>,
    #[serde(skip)]
    pub revision: i64,
}

impl ImageFileMetadata {
    pub fn has_visual_features(&self) -> bool {
        self.width.is_some() && self.dominant_color.is_some()
    }
}

/// Fully expanded view of an image: owner, file metadata, palette and likes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageDetails {
    pub id: Uuid,
    pub owner: Option<UserSummary>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub file: ImageFileMetadata,
    pub likes: i64,
    pub liked_by: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewImage {
    pub owner_id: i64,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(max = 4096, message = "Description must be at most 4096 characters"))]
    pub description: Option<String>,
}

/// Partial update; only provided fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ImageUpdate {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 4096, message = "Description must be at most 4096 characters"))]
    pub description: Option<String>,
}

impl ImageUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageSortField {
    CreatedAt,
    Title,
    Id,
}

impl ImageSortField {
    pub fn column(&self) -> &'static str {
        match self {
            ImageSortField::CreatedAt => "i.created_at",
            ImageSortField::Title => "i.title",
            ImageSortField::Id => "i.id",
        }
    }
}

/// One `order_by` term: a field, optionally prefixed with `-` for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOrder {
    pub field: ImageSortField,
    pub descending: bool,
}

impl FromStr for ImageOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let field = match name {
            "created_at" => ImageSortField::CreatedAt,
            "title" => ImageSortField::Title,
            "id" => ImageSortField::Id,
            other => return Err(format!("Unsupported order_by field: {}", other)),
        };
        Ok(ImageOrder { field, descending })
    }
}

impl ImageOrder {
    /// Parse a comma separated `order_by` list such as `-created_at,title`.
    pub fn parse_list(raw: &str) -> Result<Vec<ImageOrder>, String> {
        raw.split(',')
            .filter(|term| !term.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

/// Catalog list filter.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub owner_id: Option<i64>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    /// Empty means newest first.
    pub order_by: Vec<ImageOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamp to a 1-based page and a size within `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Pagination {
            page: page.unwrap_or(1).max(1),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let size = i64::from(pagination.size);
        let pages = if total <= 0 { 0 } else { (total + size - 1) / size };
        Page {
            items,
            total,
            page: pagination.page,
            size: pagination.size,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_list() {
        let orders = ImageOrder::parse_list("-created_at, title").unwrap();
        assert_eq!(
            orders,
            vec![
                ImageOrder {
                    field: ImageSortField::CreatedAt,
                    descending: true
                },
                ImageOrder {
                    field: ImageSortField::Title,
                    descending: false
                },
            ]
        );
        assert!(ImageOrder::parse_list("owner_id").is_err());
        assert!(ImageOrder::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.size, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_page_count() {
        let pagination = Pagination::new(Some(1), Some(10));
        assert_eq!(Page::<()>::new(vec![], 0, pagination).pages, 0);
        assert_eq!(Page::<()>::new(vec![], 10, pagination).pages, 1);
        assert_eq!(Page::<()>::new(vec![], 11, pagination).pages, 2);
    }

    #[test]
    fn test_image_update_validation() {
        let update = ImageUpdate {
            title: Some(String::new()),
            description: None,
        };
        assert!(update.validate().is_err());
        assert!(ImageUpdate::default().is_empty());
    }
}
