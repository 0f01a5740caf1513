use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use picshare_core::constants::MAX_PAGE_SIZE;
use picshare_core::models::{ImageDetails, ImageFilter, ImageOrder, Page, Pagination};
use picshare_core::AppError;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListImagesQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size, 1-100 (default 50)
    pub size: Option<u32>,
    pub owner_id: Option<i64>,
    /// RFC 3339 lower bound on creation time, inclusive
    #[serde(rename = "created_at__gte")]
    pub created_at_gte: Option<DateTime<Utc>>,
    /// RFC 3339 upper bound on creation time, inclusive
    #[serde(rename = "created_at__lte")]
    pub created_at_lte: Option<DateTime<Utc>>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    /// Comma separated list of `created_at`, `title`, `id`; prefix `-` for descending
    pub order_by: Option<String>,
}

impl ListImagesQuery {
    fn pagination(&self) -> Result<Pagination, AppError> {
        if self.page == Some(0) {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }
        if let Some(size) = self.size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(AppError::InvalidInput(format!(
                    "size must be between 1 and {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        Ok(Pagination::new(self.page, self.size))
    }

    fn into_filter(self) -> Result<ImageFilter, AppError> {
        let order_by = match self.order_by.as_deref() {
            Some(raw) => ImageOrder::parse_list(raw).map_err(AppError::InvalidInput)?,
            None => Vec::new(),
        };
        Ok(ImageFilter {
            owner_id: self.owner_id,
            created_at_gte: self.created_at_gte,
            created_at_lte: self.created_at_lte,
            search: self.search.filter(|s| !s.trim().is_empty()),
            order_by,
        })
    }
}

/// List images, newest first unless `order_by` says otherwise
#[utoipa::path(
    get,
    path = "/api/v1/images",
    tag = "images",
    params(ListImagesQuery),
    responses(
        (status = 200, description = "One page of images", body = Page<ImageDetails>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ValidatedQuery(query): ValidatedQuery<ListImagesQuery>,
) -> Result<Json<Page<ImageDetails>>, HttpAppError> {
    let pagination = query.pagination()?;
    let filter = query.into_filter()?;
    let page = state.catalog.list(&filter, pagination).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image details", body = ImageDetails),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageDetails>, HttpAppError> {
    Ok(Json(state.catalog.get(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use picshare_core::models::ImageSortField;

    #[test]
    fn test_pagination_bounds() {
        let query = ListImagesQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(query.pagination().is_err());

        let query = ListImagesQuery {
            size: Some(101),
            ..Default::default()
        };
        assert!(query.pagination().is_err());

        let query = ListImagesQuery::default();
        assert_eq!(query.pagination().unwrap(), Pagination::default());
    }

    #[test]
    fn test_filter_from_query() {
        let query = ListImagesQuery {
            search: Some("  ".to_string()),
            order_by: Some("-title,id".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert!(filter.search.is_none());
        assert_eq!(filter.order_by.len(), 2);
        assert_eq!(filter.order_by[0].field, ImageSortField::Title);
        assert!(filter.order_by[0].descending);

        let query = ListImagesQuery {
            order_by: Some("likes".to_string()),
            ..Default::default()
        };
        assert!(query.into_filter().is_err());
    }
}
