//! Domain route groups (auth, users, images).

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;

/// Token endpoints. Public: they authenticate with credentials or a refresh token.
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/auth/jwt/create", API_PREFIX),
            post(handlers::auth::create_token),
        )
        .route(
            &format!("{}/auth/jwt/refresh", API_PREFIX),
            post(handlers::auth::refresh_token),
        )
        .with_state(state)
}

pub fn registration_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/users", API_PREFIX), post(handlers::users::register_user))
        .with_state(state)
}

pub fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/users", API_PREFIX), get(handlers::users::list_users))
        .route(&format!("{}/users/me", API_PREFIX), get(handlers::users::current_user))
        .route(
            &format!("{}/users/{{id}}", API_PREFIX),
            patch(handlers::users::update_user).delete(handlers::users::delete_user),
        )
        .with_state(state)
}

pub fn image_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/images", API_PREFIX),
            post(handlers::image_upload::upload_image).get(handlers::image_get::list_images),
        )
        .route(
            &format!("{}/images/{{id}}", API_PREFIX),
            get(handlers::image_get::get_image)
                .patch(handlers::image_update::update_image)
                .delete(handlers::image_delete::delete_image),
        )
        .route(
            &format!("{}/images/{{id}}/file", API_PREFIX),
            get(handlers::image_download::download_image)
                .put(handlers::image_upload::replace_image_file),
        )
        .route(
            &format!("{}/images/{{id}}/like", API_PREFIX),
            post(handlers::image_likes::like_image).delete(handlers::image_likes::unlike_image),
        )
        .with_state(state)
}
