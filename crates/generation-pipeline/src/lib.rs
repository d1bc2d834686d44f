//! Concurrent generation pipeline for cdr-sync.
//!
//! The pipeline manufactures a batch of records under controlled
//! back-pressure:
//!
//! ```text
//!  ┌──────────────┐  put (blocks when full)  ┌──────────────────┐
//!  │  generator   │ ───────────────────────▶ │ GenerationQueue  │
//!  │  task        │                          │ (capacity = N)   │
//!  └──────┬───────┘                          └────────┬─────────┘
//!         │                                           │ poll(timeout)
//!         │            ┌──────────────┐               ▼
//!         │            │ WorkerPool   │        ┌──────────────┐
//!         └──────────▶ │ (fixed size) │ ◀───── │  collector   │
//!                      └──────┬───────┘        │  task        │
//!                             │                └──────────────┘
//!                    CountdownLatch(2) → drain → shutdown
//! ```
//!
//! [`PipelineOrchestrator::run`] blocks until both tasks have counted down
//! the join barrier, then shuts the pool down in two phases: a graceful wait
//! bounded by the grace period, then forced cancellation of whatever is
//! still running. Shutdown always runs, whether or not a task failed.

pub mod error;
pub mod latch;
pub mod orchestrator;
pub mod pool;
pub mod queue;

pub use error::{PipelineError, QueueError};
pub use latch::{CountdownLatch, LatchGuard};
pub use orchestrator::{GenerationRun, OrchestratorConfig, OrchestratorState, PipelineOrchestrator};
pub use pool::{ShutdownReport, WorkerPool};
pub use queue::{GenerationQueue, QueueConsumer, QueueProducer};
