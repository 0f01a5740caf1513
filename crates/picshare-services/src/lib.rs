//! Picshare Services Layer
//!
//! Business services composed from storage, extraction, the record store and
//! the task queue. The API crate holds thin HTTP handling and calls into the
//! services re-exported here.

pub mod services;

pub use picshare_processing::VisualFeatureExtractor;
pub use picshare_storage::{
    create_storage, FileUpload, ImageStorage, LoadedFile, LocalStorage, StorageBackend,
    StorageError, StorageResult,
};
pub use picshare_worker::{TaskQueue, TaskQueueConfig};
pub use services::auth::{AuthService, Claims, TokenType};
pub use services::catalog::CatalogService;
pub use services::reconciler::MetadataReconciler;
pub use services::users::UserService;
