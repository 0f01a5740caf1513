use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use picshare_core::models::{Credentials, TokenPair};

use crate::auth::middleware::bearer_token;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Exchange username and password for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/jwt/create",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Incorrect username or password", body = ErrorResponse)
    )
)]
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(credentials): ValidatedJson<Credentials>,
) -> Result<Json<TokenPair>, HttpAppError> {
    let pair = state
        .auth
        .login(&credentials.username, &credentials.password)
        .await?;
    Ok(Json(pair))
}

/// Exchange the refresh token in the `Authorization` header for a new pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/jwt/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or expired refresh token", body = ErrorResponse),
        (status = 403, description = "User is disabled", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, HttpAppError> {
    let token = bearer_token(&headers)?;
    let pair = state.auth.refresh(token).await?;
    Ok(Json(pair))
}
