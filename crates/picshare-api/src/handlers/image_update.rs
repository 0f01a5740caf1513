use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use picshare_core::models::{ImageDetails, ImageUpdate};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Update title and/or description
///
/// Absent fields are left unchanged. Only the owner or an admin may update.
#[utoipa::path(
    patch,
    path = "/api/v1/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    request_body = ImageUpdate,
    responses(
        (status = 200, description = "Updated image", body = ImageDetails),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, update), fields(image_id = %id, user_id = user.0.id))]
pub async fn update_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<ImageUpdate>,
) -> Result<Json<ImageDetails>, HttpAppError> {
    state.catalog.authorize_mutation(id, &user.0).await?;
    let details = state.catalog.update(id, &update).await?;
    Ok(Json(details))
}
