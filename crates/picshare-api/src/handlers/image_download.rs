use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use picshare_core::AppError;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Quote a filename for `Content-Disposition`, dropping characters that would
/// break the header.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Stream the stored bytes of an image
#[utoipa::path(
    get,
    path = "/api/v1/images/{id}/file",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image file", content_type = "application/octet-stream"),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let file = state.catalog.open_file(id).await?;
    tracing::debug!(image_id = %id, size_bytes = file.size, "Streaming image file");

    let body_stream = file.stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.size)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.filename))
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            AppError::Internal(e.to_string())
        })?;

    Ok(response)
}
