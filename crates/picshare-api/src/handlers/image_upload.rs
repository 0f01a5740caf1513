use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use picshare_core::models::{ImageFileMetadata, NewImage};
use picshare_core::AppError;
use picshare_services::FileUpload;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::extract_image_form;

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageCreatedResponse {
    pub image_id: Uuid,
}

/// Upload image handler
///
/// Accepts a multipart form with a `file` part, a `title` and an optional
/// `description`. The response is sent once the bytes and file metadata are
/// stored; width, height and colors are filled in by a background task.
#[utoipa::path(
    post,
    path = "/api/v1/images",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image uploaded", body = ImageCreatedResponse),
        (status = 400, description = "Invalid image format or form", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, multipart), fields(user_id = user.0.id, operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut form = extract_image_form(multipart, &state.upload).await?;
    let file = form.require_file()?;
    let title = form
        .title
        .take()
        .ok_or_else(|| AppError::InvalidInput("Title is required".to_string()))?;

    let new_image = NewImage {
        owner_id: user.0.id,
        title,
        description: form.description.take(),
    };

    let mut reader: &[u8] = &file.data;
    let details = state
        .catalog
        .create(
            &new_image,
            FileUpload {
                filename: file.filename,
                content_type: file.content_type,
                reader: &mut reader,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ImageCreatedResponse {
            image_id: details.id,
        }),
    ))
}

/// Replace the file of an existing image
///
/// Stores the new bytes, resets the visual fields and schedules a fresh
/// extraction. Only the owner or an admin may replace the file.
#[utoipa::path(
    put,
    path = "/api/v1/images/{id}/file",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File replaced", body = ImageFileMetadata),
        (status = 400, description = "Invalid image format", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, multipart), fields(image_id = %id, user_id = user.0.id))]
pub async fn replace_image_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ImageFileMetadata>, HttpAppError> {
    state.catalog.authorize_mutation(id, &user.0).await?;

    let file = extract_image_form(multipart, &state.upload)
        .await?
        .require_file()?;

    let mut reader: &[u8] = &file.data;
    let metadata = state
        .catalog
        .replace_file(
            id,
            FileUpload {
                filename: file.filename,
                content_type: file.content_type,
                reader: &mut reader,
            },
        )
        .await?;

    Ok(Json(metadata))
}
