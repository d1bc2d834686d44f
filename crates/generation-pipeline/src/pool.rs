//! Fixed-size task pool with two-phase shutdown.

use crate::error::PipelineError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// True when the grace period elapsed and remaining tasks were aborted.
    pub forced: bool,
    pub cancelled_tasks: usize,
    pub panicked_tasks: usize,
}

/// Runs at most `size` tasks at a time.
pub struct WorkerPool {
    tasks: JoinSet<()>,
    permits: Arc<Semaphore>,
    size: usize,
    accepting: bool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, PipelineError> {
        if size == 0 {
            return Err(PipelineError::InvalidPoolSize);
        }
        Ok(Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(size)),
            size,
            accepting: true,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks spawned and not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Submit a task. It starts once a worker slot is free.
    pub fn spawn<F>(&mut self, task: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting {
            return Err(PipelineError::PoolShutdown);
        }
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
        Ok(())
    }

    /// Stop accepting tasks, wait up to `grace` for running ones, then abort the rest.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.accepting = false;
        let mut report = ShutdownReport::default();

        let drained = {
            let tasks = &mut self.tasks;
            let panicked = &mut report.panicked_tasks;
            tokio::time::timeout(grace, async move {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("Worker task panicked: {e}");
                            *panicked += 1;
                        }
                    }
                }
            })
            .await
        };

        if drained.is_err() {
            report.forced = true;
            report.cancelled_tasks = self.tasks.len();
            warn!(
                "Worker pool did not drain within {:?}, cancelling {} task(s)",
                grace, report.cancelled_tasks
            );
            self.tasks.abort_all();
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        report.panicked_tasks += 1;
                    }
                }
            }
        } else {
            debug!("Worker pool drained gracefully");
        }

        report
    }
}
