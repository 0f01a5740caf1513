use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use picshare_core::models::User;
use picshare_core::AppError;

use crate::error::HttpAppError;

/// Authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// Extracted from request parts rather than `Extension` so handlers can combine
// it with `Multipart`.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Not authenticated".to_string())))
    }
}

/// Authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(HttpAppError(AppError::Forbidden(
                "Admin role required".to_string(),
            )));
        }
        Ok(AdminUser(user))
    }
}
