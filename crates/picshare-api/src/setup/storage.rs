//! Storage setup and initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use picshare_core::Config;
use picshare_services::{create_storage, ImageStorage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn ImageStorage>> {
    tracing::info!("Initializing image storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize image storage")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        "Image storage initialized successfully"
    );
    Ok(storage)
}
