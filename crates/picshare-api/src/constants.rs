//! API-level constants

use std::time::Duration;

pub use picshare_core::constants::API_PREFIX;

/// Path of the served OpenAPI document.
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Bytes allowed on top of the file size limit for multipart framing and text fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Upper bound for each dependency probe in the health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for queued background tasks.
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
