//! Background work that must not hold up a request: a bounded in-process
//! queue drained by a fixed number of workers.

pub mod queue;
pub mod task;

pub use queue::{TaskQueue, TaskQueueConfig};
pub use task::BackgroundTask;
