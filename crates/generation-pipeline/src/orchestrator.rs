//! Generation run orchestration.

use crate::error::{PipelineError, QueueError};
use crate::latch::CountdownLatch;
use crate::pool::{ShutdownReport, WorkerPool};
use crate::queue::{GenerationQueue, QueueConsumer, QueueProducer};
use cdr_core::Cdr;
use cdr_generator::RecordSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tasks joined by the barrier: the generator and the collector.
const PIPELINE_TASKS: usize = 2;

/// Lifecycle of a [`PipelineOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Fixed size of the worker pool.
    pub workers: usize,
    /// Per-attempt wait of the collector's poll.
    pub poll_timeout: Duration,
    /// How long shutdown waits for in-flight tasks before aborting them.
    pub grace_period: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_timeout: Duration::from_secs(5),
            grace_period: Duration::from_secs(30),
        }
    }
}

/// Result of one generation run.
///
/// `records` holds everything the collector gathered, in enqueue order,
/// even when `failure` is set.
#[derive(Debug)]
pub struct GenerationRun {
    pub records: Vec<Cdr>,
    pub requested: usize,
    /// Failed generation attempts that were retried.
    pub generation_retries: u64,
    /// Collector polls that timed out with nothing to take.
    pub empty_polls: u64,
    pub shutdown: ShutdownReport,
    pub elapsed: Duration,
    pub failure: Option<PipelineError>,
}

impl GenerationRun {
    fn empty(requested: usize) -> Self {
        Self {
            records: Vec::new(),
            requested,
            generation_retries: 0,
            empty_polls: 0,
            shutdown: ShutdownReport::default(),
            elapsed: Duration::ZERO,
            failure: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.records.len() == self.requested
    }

    /// Records on success, the recorded failure otherwise.
    pub fn into_result(self) -> Result<Vec<Cdr>, PipelineError> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        if self.records.len() != self.requested {
            return Err(PipelineError::Incomplete {
                collected: self.records.len(),
                requested: self.requested,
            });
        }
        Ok(self.records)
    }
}

/// First failure reported by either task.
#[derive(Default)]
struct RunStatus {
    failure: Mutex<Option<PipelineError>>,
}

impl RunStatus {
    fn fail(&self, error: PipelineError) {
        let mut slot = lock(&self.failure);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<PipelineError> {
        lock(&self.failure).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives a generator and a collector over a bounded queue.
///
/// Collaborators are passed in explicitly: the record source goes to
/// [`run`](Self::run), cancellation through [`with_cancellation`](Self::with_cancellation).
pub struct PipelineOrchestrator {
    config: OrchestratorConfig,
    state: watch::Sender<OrchestratorState>,
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let (state, _) = watch::channel(OrchestratorState::Idle);
        Self {
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token to interrupt runs.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    fn transition(&self, next: OrchestratorState) {
        let previous = self.state.send_replace(next);
        debug!("Orchestrator state {previous:?} -> {next:?}");
    }

    /// Generate exactly `record_count` records from `source`.
    ///
    /// Returns once both tasks have finished and the pool is shut down.
    /// Once the cancellation token has fired, every later run fails with
    /// [`PipelineError::Cancelled`] without spawning tasks.
    pub async fn run<S: RecordSource>(&self, source: S, record_count: usize) -> GenerationRun {
        let started = Instant::now();
        self.transition(OrchestratorState::Running);

        if record_count == 0 {
            self.transition(OrchestratorState::Draining);
            self.transition(OrchestratorState::Terminated);
            return GenerationRun::empty(0);
        }

        let mut run = GenerationRun::empty(record_count);
        if self.cancel.is_cancelled() {
            warn!("Orchestrator already cancelled, not starting run of {record_count} records");
            run.failure = Some(PipelineError::Cancelled);
            self.transition(OrchestratorState::Draining);
            self.transition(OrchestratorState::Terminated);
            return run;
        }
        let (producer, consumer) = match GenerationQueue::bounded(record_count) {
            Ok(halves) => halves,
            Err(e) => {
                run.failure = Some(e.into());
                self.transition(OrchestratorState::Draining);
                self.transition(OrchestratorState::Terminated);
                return run;
            }
        };
        let mut pool = match WorkerPool::new(self.config.workers) {
            Ok(pool) => pool,
            Err(e) => {
                run.failure = Some(e);
                self.transition(OrchestratorState::Draining);
                self.transition(OrchestratorState::Terminated);
                return run;
            }
        };

        info!(
            "Starting generation run of {record_count} records on {} workers",
            pool.size()
        );

        let latch = CountdownLatch::new(PIPELINE_TASKS);
        let status = Arc::new(RunStatus::default());
        let batch = Arc::new(Mutex::new(Vec::with_capacity(record_count)));
        let retries = Arc::new(AtomicU64::new(0));
        let empty_polls = Arc::new(AtomicU64::new(0));
        let cancel = self.cancel.child_token();

        let generator = {
            let guard = latch.guard();
            let status = status.clone();
            let retries = retries.clone();
            let cancel = cancel.clone();
            async move {
                let _guard = guard;
                if let Err(e) = generate(source, producer, record_count, retries, cancel).await {
                    warn!("Generator task failed: {e}");
                    status.fail(e);
                }
            }
        };
        if let Err(e) = pool.spawn(generator) {
            status.fail(e);
        }

        let collector = {
            let guard = latch.guard();
            let status = status.clone();
            let batch = batch.clone();
            let empty_polls = empty_polls.clone();
            let cancel = cancel.clone();
            let poll_timeout = self.config.poll_timeout;
            async move {
                let _guard = guard;
                if let Err(e) =
                    collect(consumer, record_count, poll_timeout, batch, empty_polls, cancel).await
                {
                    warn!("Collector task failed: {e}");
                    status.fail(e);
                }
            }
        };
        if let Err(e) = pool.spawn(collector) {
            status.fail(e);
        }

        tokio::select! {
            _ = latch.wait() => {}
            _ = self.cancel.cancelled() => {
                warn!("Generation run cancelled, draining worker pool");
                status.fail(PipelineError::Cancelled);
                cancel.cancel();
            }
        }

        self.transition(OrchestratorState::Draining);
        run.shutdown = pool.shutdown(self.config.grace_period).await;
        self.transition(OrchestratorState::Terminated);

        run.records = std::mem::take(&mut *lock(&batch));
        run.generation_retries = retries.load(Ordering::Relaxed);
        run.empty_polls = empty_polls.load(Ordering::Relaxed);
        run.failure = status.take();
        if run.failure.is_none() && run.shutdown.panicked_tasks > 0 {
            run.failure = Some(PipelineError::TaskPanicked(run.shutdown.panicked_tasks));
        }
        run.elapsed = started.elapsed();

        match &run.failure {
            None => info!(
                "Generation run complete: {} records in {:?} ({} retries)",
                run.records.len(),
                run.elapsed,
                run.generation_retries
            ),
            Some(e) => warn!(
                "Generation run failed: {}/{} records collected: {e}",
                run.records.len(),
                run.requested
            ),
        }

        run
    }
}

async fn generate<S: RecordSource>(
    mut source: S,
    producer: QueueProducer,
    count: usize,
    retries: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let mut produced = 0;
    while produced < count {
        if cancel.is_cancelled() {
            return Err(PipelineError::GeneratorInterrupted(format!(
                "cancelled after {produced} of {count} records"
            )));
        }

        let record = match source.next_record() {
            Ok(record) => record,
            Err(e) => {
                retries.fetch_add(1, Ordering::Relaxed);
                debug!("Discarding failed draft and retrying: {e}");
                tokio::task::yield_now().await;
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PipelineError::GeneratorInterrupted(format!(
                    "cancelled after {produced} of {count} records"
                )));
            }
            sent = producer.put(record) => {
                sent.map_err(|e| PipelineError::GeneratorInterrupted(e.to_string()))?;
            }
        }
        produced += 1;
    }
    debug!("Generator produced {produced} records");
    Ok(())
}

async fn collect(
    mut consumer: QueueConsumer,
    count: usize,
    poll_timeout: Duration,
    batch: Arc<Mutex<Vec<Cdr>>>,
    empty_polls: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let mut collected = 0;
    while collected < count || !consumer.is_empty() {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PipelineError::CollectorInterrupted(format!(
                    "cancelled after {collected} of {count} records"
                )));
            }
            polled = consumer.poll(poll_timeout) => polled,
        };

        match polled {
            Ok(Some(record)) => {
                lock(&batch).push(record);
                collected += 1;
            }
            Ok(None) => {
                empty_polls.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Polling timeout after {poll_timeout:?}, queue might be empty ({collected}/{count} collected)"
                );
            }
            Err(QueueError::Closed) => {
                return Err(PipelineError::CollectorInterrupted(format!(
                    "queue closed after {collected} of {count} records"
                )));
            }
            Err(e) => return Err(e.into()),
        }
    }
    debug!("Collector gathered {collected} records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::ServiceType;
    use cdr_generator::{GenerationError, RecordFactory};

    fn counting_source() -> impl RecordSource {
        let mut next = 0u32;
        move || {
            next += 1;
            Ok::<Cdr, GenerationError>(Cdr::new(
                format!("+2010000{next:04}"),
                Some("+201119999999".to_string()),
                ServiceType::Call,
                f64::from(next),
                "2024-03-01T10:00:00",
            ))
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            workers: 4,
            poll_timeout: Duration::from_millis(50),
            grace_period: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_run_returns_records_in_enqueue_order() {
        let orchestrator = PipelineOrchestrator::new(fast_config());
        let run = orchestrator.run(counting_source(), 5).await;

        assert!(run.is_complete(), "failure: {:?}", run.failure);
        let usages: Vec<f64> = run.records.iter().map(|r| r.usage).collect();
        assert_eq!(usages, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(run.records.iter().all(|r| r.validate().is_ok()));
        assert_eq!(orchestrator.state(), OrchestratorState::Terminated);
        assert!(!run.shutdown.forced);
    }

    #[tokio::test]
    async fn test_run_zero_records() {
        let orchestrator = PipelineOrchestrator::new(fast_config());
        let run = orchestrator.run(counting_source(), 0).await;

        assert!(run.records.is_empty());
        assert!(run.is_complete());
        assert_eq!(orchestrator.state(), OrchestratorState::Terminated);
    }

    #[tokio::test]
    async fn test_failed_drafts_are_retried_without_counting() {
        let mut attempt = 0u32;
        let flaky = move || {
            attempt += 1;
            if attempt % 3 == 0 {
                return Err(GenerationError::Source("sub-generator failure".to_string()));
            }
            Ok(Cdr::new(
                "+201001234567",
                None,
                ServiceType::Data,
                f64::from(attempt),
                "2024-03-01T10:00:00",
            ))
        };

        let orchestrator = PipelineOrchestrator::new(fast_config());
        let run = orchestrator.run(flaky, 10).await;

        assert!(run.is_complete());
        assert_eq!(run.records.len(), 10);
        assert!(run.generation_retries >= 4);
        assert!(run.records.iter().all(|r| r.usage as u32 % 3 != 0));
    }

    #[tokio::test]
    async fn test_run_with_record_factory() {
        let orchestrator = PipelineOrchestrator::new(fast_config());
        let run = orchestrator.run(RecordFactory::new(42), 25).await;

        let records = run.into_result().unwrap();
        assert_eq!(records.len(), 25);
        assert!(records.iter().all(|r| r.id.is_none()));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let orchestrator = PipelineOrchestrator::new(fast_config());
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);

        let mut states = orchestrator.subscribe_state();
        let seen = tokio::spawn(async move {
            let mut seen = Vec::new();
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                seen.push(state);
                if state == OrchestratorState::Terminated {
                    break;
                }
            }
            seen
        });

        orchestrator.run(counting_source(), 3).await;
        let seen = seen.await.unwrap();
        assert_eq!(seen.last(), Some(&OrchestratorState::Terminated));
        assert!(!seen.contains(&OrchestratorState::Idle));
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_partial_results() {
        let cancel = CancellationToken::new();
        let mut produced = 0u32;
        let trigger = cancel.clone();
        let source = move || {
            produced += 1;
            if produced > 3 {
                trigger.cancel();
                return Err(GenerationError::Source("stalled".to_string()));
            }
            Ok(Cdr::new(
                "+201001234567",
                None,
                ServiceType::Sms,
                1.0,
                "2024-03-01T10:00:00",
            ))
        };

        let orchestrator = PipelineOrchestrator::new(fast_config()).with_cancellation(cancel);
        let run = orchestrator.run(source, 10).await;

        assert!(run.failure.is_some());
        assert!(run.records.len() <= 3);
        assert!(!run.is_complete());
        assert_eq!(orchestrator.state(), OrchestratorState::Terminated);
        assert!(matches!(
            run.into_result(),
            Err(PipelineError::Cancelled
                | PipelineError::GeneratorInterrupted(_)
                | PipelineError::CollectorInterrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_run_after_cancellation_fails_without_generating() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let source = move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok::<Cdr, GenerationError>(Cdr::new(
                "+201001234567",
                None,
                ServiceType::Sms,
                1.0,
                "2024-03-01T10:00:00",
            ))
        };

        let orchestrator = PipelineOrchestrator::new(fast_config()).with_cancellation(cancel);
        let run = orchestrator.run(source, 5).await;

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(run.records.is_empty());
        assert_eq!(run.failure, Some(PipelineError::Cancelled));
        assert_eq!(orchestrator.state(), OrchestratorState::Terminated);
    }

    #[tokio::test]
    async fn test_panicking_source_fails_run() {
        let mut calls = 0u32;
        let source = move || {
            calls += 1;
            if calls == 2 {
                panic!("generator bug");
            }
            Ok::<Cdr, GenerationError>(Cdr::new(
                "+201001234567",
                None,
                ServiceType::Data,
                1.0,
                "2024-03-01T10:00:00",
            ))
        };

        let orchestrator = PipelineOrchestrator::new(fast_config());
        let run = orchestrator.run(source, 4).await;

        assert!(run.failure.is_some());
        assert_eq!(run.records.len(), 1);
        assert_eq!(orchestrator.state(), OrchestratorState::Terminated);
    }

    #[tokio::test]
    async fn test_invalid_pool_size_fails_without_running() {
        let config = OrchestratorConfig {
            workers: 0,
            ..fast_config()
        };
        let run = PipelineOrchestrator::new(config)
            .run(counting_source(), 2)
            .await;
        assert_eq!(run.failure, Some(PipelineError::InvalidPoolSize));
        assert!(run.records.is_empty());
    }
}
