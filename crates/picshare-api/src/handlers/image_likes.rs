use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Like an image; liking twice has no further effect
#[utoipa::path(
    post,
    path = "/api/v1/images/{id}/like",
    tag = "likes",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 204, description = "Image liked"),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn like_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.catalog.like(id, user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a like
#[utoipa::path(
    delete,
    path = "/api/v1/images/{id}/like",
    tag = "likes",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 204, description = "Like removed"),
        (status = 404, description = "The image was not liked by the caller", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlike_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.catalog.unlike(id, user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
