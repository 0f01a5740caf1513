//! Application state shared by every handler.

use std::sync::Arc;

use picshare_core::Config;
use picshare_services::{AuthService, CatalogService, ImageStorage, TaskQueue, UserService};
use sqlx::SqlitePool;

/// Upload limits applied by the HTTP layer before the catalog is called.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub allowed_content_types: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub storage: Arc<dyn ImageStorage>,
    pub catalog: CatalogService,
    pub users: UserService,
    pub auth: AuthService,
    pub tasks: TaskQueue,
    pub upload: UploadConfig,
}
