//! Unit of background work
//!
//! Services implement [`BackgroundTask`] for each kind of deferred job and hand
//! boxed instances to the [`TaskQueue`](crate::TaskQueue).

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BackgroundTask: Send + 'static {
    /// Short, static label used in logs.
    fn name(&self) -> &'static str;

    /// Run to completion. Errors are logged by the queue and otherwise dropped.
    async fn run(self: Box<Self>) -> Result<()>;
}
