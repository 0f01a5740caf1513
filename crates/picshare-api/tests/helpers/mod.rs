//! Test helpers: build the application over a temp SQLite database and local
//! storage, and drive it through `axum-test`.
//!
//! Run from workspace root: `cargo test -p picshare-api`.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use picshare_api::constants;
use picshare_api::setup;
use picshare_api::state::AppState;
use picshare_core::{Config, PicshareConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Test application: server, state and the temp dir holding database and files.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

/// A registered user with a fresh token pair.
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Setup test app with an isolated database, local storage and a bootstrap admin.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let database_url = format!("sqlite://{}", temp_dir.path().join("picshare.db").display());
    let storage_path = temp_dir.path().join("storage");

    let mut config = PicshareConfig::for_local(
        &database_url,
        storage_path.to_str().expect("utf-8 temp path"),
        TEST_JWT_SECRET,
    );
    config.base.admin_username = Some(ADMIN_USERNAME.to_string());
    config.base.admin_password = Some(ADMIN_PASSWORD.to_string());

    let (state, router) = setup::build_app(Config(Box::new(config)))
        .await
        .expect("Failed to build app");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Wait until every scheduled background extraction has finished.
    pub async fn settle(&self) {
        self.state.tasks.wait_idle().await;
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.server
            .post(&api_path("/auth/jwt/create"))
            .json(&json!({ "username": username, "password": password }))
            .await
    }

    async fn tokens_for(&self, id: i64, username: &str, password: &str) -> TestUser {
        let response = self.login(username, password).await;
        assert_eq!(response.status_code(), 200);
        let tokens: Value = response.json();
        TestUser {
            id,
            username: username.to_string(),
            access_token: tokens["access_token"].as_str().unwrap().to_string(),
            refresh_token: tokens["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Register a user through the API and log them in.
    pub async fn register_user(&self, username: &str) -> TestUser {
        let password = format!("{}-password", username);
        let response = self
            .server
            .post(&api_path("/users"))
            .json(&json!({ "username": username, "password": password }))
            .await;
        assert_eq!(response.status_code(), 201);
        let user: Value = response.json();
        let id = user["id"].as_i64().unwrap();
        self.tokens_for(id, username, &password).await
    }

    pub async fn admin(&self) -> TestUser {
        let admin = self
            .state
            .users
            .get_by_credentials(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .expect("bootstrap admin exists");
        self.tokens_for(admin.id, ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Upload an image and return the response.
    pub async fn upload(
        &self,
        user: &TestUser,
        title: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> TestResponse {
        let part = Part::bytes(data)
            .file_name("upload.png")
            .mime_type(content_type);
        let form = MultipartForm::new()
            .add_text("title", title.to_string())
            .add_part("file", part);
        self.server
            .post(&api_path("/images"))
            .add_header("Authorization", bearer(&user.access_token))
            .multipart(form)
            .await
    }

    /// Upload a PNG and return the new image id.
    pub async fn upload_png(&self, user: &TestUser, title: &str, data: Vec<u8>) -> String {
        let response = self.upload(user, title, data, "image/png").await;
        assert_eq!(response.status_code(), 201);
        let body: Value = response.json();
        body["image_id"].as_str().unwrap().to_string()
    }

    pub async fn get_image(&self, user: &TestUser, image_id: &str) -> TestResponse {
        self.server
            .get(&api_path(&format!("/images/{}", image_id)))
            .add_header("Authorization", bearer(&user.access_token))
            .await
    }
}
