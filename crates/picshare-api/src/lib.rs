//! Picshare API Library
//!
//! HTTP handlers, authentication middleware and application setup. The
//! binary in `main.rs` only loads configuration and calls into [`setup`].

mod api_doc;
pub mod constants;
mod handlers;
mod telemetry;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use picshare_worker::{TaskQueue, TaskQueueConfig};
