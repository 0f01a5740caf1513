use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use picshare_core::models::{Credentials, Role, User, UserUpdate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Public view of a user account.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            role: user.role,
            disabled: user.disabled,
            created_at: user.created_at,
        }
    }
}

/// Register a new account with the `user` role
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = Credentials,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid or taken username, or invalid password", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(credentials): ValidatedJson<Credentials>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = state.users.create_user(&credentials).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user(user: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user.0))
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "All users ordered by username", body = Vec<UserResponse>),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, HttpAppError> {
    let users = state.users.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Change role, disabled flag or password of a user (admin only)
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, update), fields(admin_id = admin.0.id, user_id = id))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(update): ValidatedJson<UserUpdate>,
) -> Result<Json<UserResponse>, HttpAppError> {
    let user = state.users.update_user(id, &update).await?;
    tracing::info!(user_id = user.id, role = %user.role, disabled = user.disabled, "User updated");
    Ok(Json(UserResponse::from(user)))
}

/// Delete a user (admin only)
///
/// Their likes are removed; images they own are kept without an owner.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = admin.0.id, user_id = id))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpAppError> {
    state.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
