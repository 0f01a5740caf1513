//! Task queue: bounded submission channel, worker pool and idle tracking.
//!
//! Shutdown: [`TaskQueue::shutdown`] stops new submissions, lets tasks already
//! queued run, and returns once the pool is idle. Tasks are never cancelled;
//! each runs to completion or failure. Callers that need a deadline wrap
//! `shutdown` themselves.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, Notify, Semaphore};

use crate::task::BackgroundTask;

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    /// Tasks running at the same time.
    pub max_workers: usize,
    /// Tasks that may wait for a worker before `submit` blocks.
    pub capacity: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            capacity: 256,
        }
    }
}

/// Submitted tasks that have not finished yet, queued or running.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    task_tx: mpsc::Sender<Box<dyn BackgroundTask>>,
    shutdown_tx: mpsc::Sender<()>,
    pending: Arc<Pending>,
}

impl TaskQueue {
    /// Start the worker pool. Must be called inside a Tokio runtime.
    pub fn new(config: TaskQueueConfig) -> Self {
        let (task_tx, task_rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let pending = Arc::new(Pending::default());

        let pool_pending = pending.clone();
        tokio::spawn(async move {
            Self::worker_pool(config, task_rx, shutdown_rx, pool_pending).await;
        });

        Self {
            task_tx,
            shutdown_tx,
            pending,
        }
    }

    /// Queue `task` for execution, waiting for room if the queue is full.
    ///
    /// Fails once the queue has been shut down.
    pub async fn submit(&self, task: Box<dyn BackgroundTask>) -> Result<()> {
        let name = task.name();
        self.pending.increment();
        if self.task_tx.send(task).await.is_err() {
            self.pending.decrement();
            tracing::warn!(task = name, "Task rejected, queue is shut down");
            return Err(anyhow!("Task queue is shut down"));
        }

        tracing::debug!(task = name, pending = self.pending_count(), "Task submitted to queue");
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Resolve once every submitted task has finished.
    pub async fn wait_idle(&self) {
        loop {
            // Register before checking so a wakeup between the two is not lost.
            let notified = self.pending.idle.notified();
            if self.pending_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// [`wait_idle`](Self::wait_idle) bounded by `timeout`. Returns `false` on timeout.
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_idle()).await.is_ok()
    }

    /// Stop accepting tasks and wait for queued and running ones to finish.
    pub async fn shutdown(&self) {
        tracing::info!(pending = self.pending_count(), "Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
        self.wait_idle().await;
    }

    async fn worker_pool(
        config: TaskQueueConfig,
        mut task_rx: mpsc::Receiver<Box<dyn BackgroundTask>>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pending: Arc<Pending>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            capacity = config.capacity,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let mut shutting_down = false;

        loop {
            let task = tokio::select! {
                _ = shutdown_rx.recv(), if !shutting_down => {
                    tracing::info!("Task queue closed, draining queued tasks");
                    task_rx.close();
                    shutting_down = true;
                    continue;
                }
                task = task_rx.recv() => task,
            };
            let Some(task) = task else {
                break;
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    pending.decrement();
                    break;
                }
            };

            let pending = pending.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::run_task(task).await;
                pending.decrement();
            });
        }

        tracing::info!("Task queue worker pool stopped");
    }

    /// Run one task on its own Tokio task so a panic is contained and reported.
    async fn run_task(task: Box<dyn BackgroundTask>) {
        let name = task.name();
        let start = std::time::Instant::now();

        match tokio::spawn(task.run()).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    task = name,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Task completed successfully"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(task = name, error = %e, "Task execution failed");
            }
            Err(join_error) => {
                tracing::error!(task = name, error = %join_error, "Task panicked");
            }
        }
    }
}
