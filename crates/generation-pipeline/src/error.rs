use thiserror::Error;

/// Errors raised by the generation queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue capacity must be at least 1")]
    ZeroCapacity,

    /// The other side of the queue is gone.
    #[error("Queue closed")]
    Closed,
}

/// Errors that fail a generation run.
///
/// A failed run still returns whatever the collector gathered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Worker pool size must be at least 1")]
    InvalidPoolSize,

    #[error("Worker pool is shut down and accepts no new tasks")]
    PoolShutdown,

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Generator task was interrupted: {0}")]
    GeneratorInterrupted(String),

    #[error("Collector task was interrupted: {0}")]
    CollectorInterrupted(String),

    #[error("Generation run was cancelled")]
    Cancelled,

    #[error("{0} task(s) panicked")]
    TaskPanicked(usize),

    #[error("Generation run incomplete: collected {collected} of {requested} records")]
    Incomplete { collected: usize, requested: usize },
}
