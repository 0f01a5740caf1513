//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use picshare_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Picshare API",
        version = "0.1.0",
        description = "Image sharing: upload, browse, like and download images. Width, height and colors are extracted in the background after upload."
    ),
    paths(
        // Auth
        handlers::auth::create_token,
        handlers::auth::refresh_token,
        // Users
        handlers::users::register_user,
        handlers::users::current_user,
        handlers::users::list_users,
        handlers::users::update_user,
        handlers::users::delete_user,
        // Images
        handlers::image_upload::upload_image,
        handlers::image_upload::replace_image_file,
        handlers::image_get::list_images,
        handlers::image_get::get_image,
        handlers::image_download::download_image,
        handlers::image_update::update_image,
        handlers::image_delete::delete_image,
        // Likes
        handlers::image_likes::like_image,
        handlers::image_likes::unlike_image,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::users::UserResponse,
        handlers::image_upload::ImageCreatedResponse,
        models::Credentials,
        models::UserUpdate,
        models::Role,
        models::TokenPair,
        models::ImageDetails,
        models::ImageFileMetadata,
        models::ImageUpdate,
        models::UserSummary,
        models::HexColor,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "JWT token issuance"),
        (name = "users", description = "Account registration and administration"),
        (name = "images", description = "Image catalog"),
        (name = "likes", description = "Image likes")
    )
)]
pub struct ApiDoc;
