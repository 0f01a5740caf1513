//! Service initialization and application state setup

use std::sync::Arc;

use anyhow::{Context, Result};
use picshare_core::models::Credentials;
use picshare_core::Config;
use picshare_db::{ImageRepository, UserRepository};
use picshare_services::{
    AuthService, CatalogService, ImageStorage, MetadataReconciler, TaskQueue, TaskQueueConfig,
    UserService, VisualFeatureExtractor,
};
use sqlx::SqlitePool;

use crate::state::{AppState, UploadConfig};

/// Initialize all services and repositories, returning the application state
pub async fn initialize_services(
    config: &Config,
    pool: SqlitePool,
    storage: Arc<dyn ImageStorage>,
) -> Result<Arc<AppState>> {
    let image_repository = ImageRepository::new(pool.clone());
    let user_repository = UserRepository::new(pool.clone());

    let task_queue_config = TaskQueueConfig {
        max_workers: config.task_queue_max_workers(),
        capacity: config.task_queue_capacity(),
        ..TaskQueueConfig::default()
    };
    tracing::info!(
        max_workers = task_queue_config.max_workers,
        capacity = task_queue_config.capacity,
        "Starting background task queue"
    );
    let tasks = TaskQueue::new(task_queue_config);

    let reconciler = MetadataReconciler::new(
        storage.clone(),
        image_repository.clone(),
        VisualFeatureExtractor::new(config.palette_size()),
        tasks.clone(),
        config.spool_max_memory_bytes(),
    );
    let catalog = CatalogService::new(image_repository, storage.clone(), reconciler);

    let users = UserService::new(user_repository);
    let auth = AuthService::new(
        users.clone(),
        config.jwt_secret(),
        chrono::Duration::minutes(config.jwt_access_ttl_minutes()),
        chrono::Duration::days(config.jwt_refresh_ttl_days()),
    );

    if let Some((username, password)) = config.bootstrap_admin() {
        let admin = users
            .ensure_admin(&Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .context("Failed to create bootstrap admin account")?;
        tracing::info!(user_id = admin.id, username = %admin.username, "Bootstrap admin account ready");
    }

    Ok(Arc::new(AppState {
        config: config.clone(),
        pool,
        storage,
        catalog,
        users,
        auth,
        tasks,
        upload: UploadConfig {
            max_file_size: config.max_file_size_bytes(),
            allowed_content_types: config.allowed_content_types().to_vec(),
        },
    }))
}
