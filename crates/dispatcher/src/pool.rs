//! WorkerPool - N parallel consumers over one input channel.
//!
//! Each worker loops: pop `(index, item)` with a timeout, apply the shared
//! transform, push `(index, result)` downstream. No ordering is kept between
//! workers; the index travels with every item so reassembly can restore it.
//!
//! Exit conditions per worker:
//! - fatal signal: abort immediately, even with items still queued
//! - pop timed out AND stop requested: input is drained, exit
//! - input closed and drained: exit
//! - output closed: nowhere to deliver, exit

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{FailurePolicy, FatalCause, IndexedItem, Signals, Transform, TransformError};
use ingestion::{BoundedChannel, PopError};
use observability::metrics::{record_item_failed, record_item_processed, record_item_retried};
use observability::RunningStats;
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool name, used in thread names, logs and metrics
    pub name: String,

    /// Number of workers, >= 1
    pub workers: usize,

    /// Pop timeout; also the worst-case latency to observe a stop signal
    pub pop_timeout: Duration,

    pub failure_policy: FailurePolicy,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        Self {
            name: name.into(),
            workers,
            pop_timeout: Duration::from_secs(1),
            failure_policy: FailurePolicy::Skip,
        }
    }

    pub fn with_pop_timeout(mut self, pop_timeout: Duration) -> Self {
        self.pop_timeout = pop_timeout;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

/// An item the pool gave up on. Its index is never delivered downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub index: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stop requested and input found empty
    Drained,
    /// Input channel closed and drained
    InputClosed,
    /// Output channel closed
    OutputClosed,
    /// Fatal signal observed (or raised by this worker under `FailBatch`)
    Aborted,
    /// Worker thread panicked outside the guarded transform
    Panicked,
}

#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub processed: u64,
    pub retried: u64,
    pub failed: Vec<FailedItem>,
    /// Successful transform latency (ms)
    pub latency_ms: RunningStats,
    pub exit: WorkerExit,
}

impl WorkerReport {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            processed: 0,
            retried: 0,
            failed: Vec::new(),
            latency_ms: RunningStats::default(),
            exit: WorkerExit::Drained,
        }
    }
}

/// Result of `WorkerPool::join_all`
#[derive(Debug, Clone)]
pub struct PoolReport {
    pub name: String,
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    pub fn processed(&self) -> u64 {
        self.workers.iter().map(|w| w.processed).sum()
    }

    pub fn retried(&self) -> u64 {
        self.workers.iter().map(|w| w.retried).sum()
    }

    /// Failed items across all workers, ordered by index
    pub fn failed(&self) -> Vec<FailedItem> {
        let mut failed: Vec<FailedItem> = self
            .workers
            .iter()
            .flat_map(|w| w.failed.iter().cloned())
            .collect();
        failed.sort_by_key(|f| f.index);
        failed
    }

    pub fn latency_ms(&self) -> RunningStats {
        let mut merged = RunningStats::default();
        for w in &self.workers {
            merged.merge(&w.latency_ms);
        }
        merged
    }
}

enum ItemFailure {
    Error(TransformError),
    Panic(String),
}

impl ItemFailure {
    fn reason(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Panic(_) => "panic",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Error(e) => e.to_string(),
            Self::Panic(msg) => format!("transform panicked: {msg}"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

struct Worker<T, U> {
    id: usize,
    pool: String,
    transform: Arc<dyn Transform<T, U>>,
    input: BoundedChannel<IndexedItem<T>>,
    output: BoundedChannel<IndexedItem<U>>,
    signals: Signals,
    pop_timeout: Duration,
    policy: FailurePolicy,
}

impl<T: Clone, U> Worker<T, U> {
    fn run(self) -> WorkerReport {
        let mut report = WorkerReport::new(self.id);

        report.exit = loop {
            if self.signals.is_fatal() {
                break WorkerExit::Aborted;
            }

            let item = match self.input.pop_timeout(self.pop_timeout) {
                Ok(item) => item,
                Err(PopError::Empty) if self.signals.stop_requested() => break WorkerExit::Drained,
                Err(PopError::Empty) => continue,
                Err(PopError::Closed) => break WorkerExit::InputClosed,
            };

            if let Some(exit) = self.process(item, &mut report) {
                break exit;
            }
        };

        debug!(
            pool = %self.pool,
            worker = self.id,
            processed = report.processed,
            failed = report.failed.len(),
            exit = ?report.exit,
            "worker exiting"
        );
        report
    }

    /// Returns `Some(exit)` when the worker must stop.
    fn process(&self, item: IndexedItem<T>, report: &mut WorkerReport) -> Option<WorkerExit> {
        let IndexedItem { index, value } = item;
        let started = Instant::now();

        match self.apply_with_policy(index, value, report) {
            Ok(result) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                if self.output.push(IndexedItem::new(index, result)).is_err() {
                    return Some(WorkerExit::OutputClosed);
                }
                report.processed += 1;
                report.latency_ms.push(latency_ms);
                record_item_processed(&self.pool, latency_ms);
                None
            }
            Err(failure) => {
                let message = failure.message();
                record_item_failed(&self.pool, failure.reason());
                report.failed.push(FailedItem {
                    index,
                    reason: message.clone(),
                });

                if self.policy == FailurePolicy::FailBatch {
                    error!(pool = %self.pool, worker = self.id, index, error = %message, "transform failed, failing batch");
                    self.signals.raise_fatal(
                        FatalCause::new("worker", format!("item {index}: {message}"))
                            .with_source(self.pool.as_str()),
                    );
                    return Some(WorkerExit::Aborted);
                }

                warn!(pool = %self.pool, worker = self.id, index, error = %message, "transform failed, skipping item");
                None
            }
        }
    }

    fn apply_with_policy(
        &self,
        index: u64,
        value: T,
        report: &mut WorkerReport,
    ) -> Result<U, ItemFailure> {
        let max_attempts = match self.policy {
            FailurePolicy::Retry { max_attempts } => max_attempts.max(1),
            FailurePolicy::Skip | FailurePolicy::FailBatch => 1,
        };
        if max_attempts == 1 {
            return self.apply_guarded(value);
        }

        let mut attempt = 1;
        loop {
            match self.apply_guarded(value.clone()) {
                Ok(result) => return Ok(result),
                Err(failure) if attempt >= max_attempts => return Err(failure),
                Err(failure) => {
                    debug!(pool = %self.pool, index, attempt, error = %failure.message(), "retrying item");
                    attempt += 1;
                    report.retried += 1;
                    record_item_retried(&self.pool);
                }
            }
        }
    }

    /// A panicking transform is reported like an error instead of killing the worker.
    fn apply_guarded(&self, value: T) -> Result<U, ItemFailure> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.transform.apply(value))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ItemFailure::Error(e)),
            Err(payload) => Err(ItemFailure::Panic(panic_message(payload.as_ref()))),
        }
    }
}

/// Running pool of worker threads
pub struct WorkerPool {
    name: String,
    workers: Vec<(usize, JoinHandle<WorkerReport>)>,
}

impl WorkerPool {
    /// Spawn exactly `config.workers` workers.
    ///
    /// If a thread cannot be created, the fatal signal is raised, the workers
    /// already started are joined, and the error is returned.
    #[instrument(
        name = "worker_pool_start",
        skip(transform, input, output, signals),
        fields(pool = %config.name, workers = config.workers)
    )]
    pub fn start<T, U>(
        config: PoolConfig,
        transform: Arc<dyn Transform<T, U>>,
        input: BoundedChannel<IndexedItem<T>>,
        output: BoundedChannel<IndexedItem<U>>,
        signals: Signals,
    ) -> Result<Self, DispatcherError>
    where
        T: Clone + Send + 'static,
        U: Send + 'static,
    {
        if config.workers == 0 {
            return Err(DispatcherError::InvalidWorkerCount { pool: config.name });
        }

        let mut pool = Self {
            name: config.name.clone(),
            workers: Vec::with_capacity(config.workers),
        };

        for id in 0..config.workers {
            let worker = Worker {
                id,
                pool: config.name.clone(),
                transform: Arc::clone(&transform),
                input: input.clone(),
                output: output.clone(),
                signals: signals.clone(),
                pop_timeout: config.pop_timeout,
                policy: config.failure_policy,
            };
            let thread_name = format!("pool-{}-{id}", config.name);
            match thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker.run())
            {
                Ok(handle) => pool.workers.push((id, handle)),
                Err(source) => {
                    error!(pool = %config.name, worker = id, error = %source, "failed to spawn worker");
                    signals.raise_fatal(
                        FatalCause::new("worker_pool", format!("spawn failed: {source}"))
                            .with_source(config.name.as_str()),
                    );
                    pool.join_all();
                    return Err(DispatcherError::Spawn {
                        name: thread_name,
                        source,
                    });
                }
            }
        }

        debug!(pool = %pool.name, workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Join every worker. Never panics; a panicked worker is reported as such.
    #[instrument(name = "worker_pool_join", skip(self), fields(pool = %self.name))]
    pub fn join_all(self) -> PoolReport {
        let workers = self
            .workers
            .into_iter()
            .map(|(id, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(pool = %self.name, worker = id, "worker thread panicked");
                    WorkerReport {
                        exit: WorkerExit::Panicked,
                        ..WorkerReport::new(id)
                    }
                })
            })
            .collect();

        PoolReport {
            name: self.name,
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::ChannelConfig;

    const TIMEOUT: Duration = Duration::from_millis(20);

    type Chan = BoundedChannel<IndexedItem<u64>>;

    fn channels(cap: usize) -> (Chan, Chan) {
        (
            BoundedChannel::new("in", ChannelConfig::blocking(cap)).unwrap(),
            BoundedChannel::new("out", ChannelConfig::blocking(cap)).unwrap(),
        )
    }

    fn double() -> Arc<dyn Transform<u64, u64>> {
        Arc::new(|x: u64| -> Result<u64, TransformError> { Ok(x * 2) })
    }

    fn drain_sorted(ch: &Chan) -> Vec<IndexedItem<u64>> {
        let mut items: Vec<_> = std::iter::from_fn(|| ch.try_pop().ok()).collect();
        items.sort_by_key(|i| i.index);
        items
    }

    #[test]
    fn test_zero_workers_rejected() {
        let (input, output) = channels(4);
        let err = WorkerPool::start(PoolConfig::new("p", 0), double(), input, output, Signals::new());
        assert!(matches!(err, Err(DispatcherError::InvalidWorkerCount { .. })));
    }

    #[test]
    fn test_spawns_exact_worker_count() {
        let (input, output) = channels(4);
        let signals = Signals::new();
        let pool = WorkerPool::start(
            PoolConfig::new("p", 3).with_pop_timeout(TIMEOUT),
            double(),
            input,
            output,
            signals.clone(),
        )
        .unwrap();
        assert_eq!(pool.size(), 3);

        signals.request_stop();
        let report = pool.join_all();
        assert_eq!(report.workers.len(), 3);
        assert!(report.workers.iter().all(|w| w.exit == WorkerExit::Drained));
    }

    #[test]
    fn test_stop_drains_pending_items() {
        let (input, output) = channels(16);
        for i in 0..10u64 {
            input.push(IndexedItem::new(i, i)).unwrap();
        }
        let signals = Signals::new();
        signals.request_stop();

        let report = WorkerPool::start(
            PoolConfig::new("p", 2).with_pop_timeout(TIMEOUT),
            double(),
            input.clone(),
            output.clone(),
            signals,
        )
        .unwrap()
        .join_all();

        assert_eq!(report.processed(), 10);
        assert!(input.is_empty());
        let values: Vec<u64> = drain_sorted(&output).iter().map(|i| i.value).collect();
        assert_eq!(values, (0..10).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_skip_policy_leaves_gap() {
        let (input, output) = channels(16);
        for i in 0..5u64 {
            input.push(IndexedItem::new(i, i)).unwrap();
        }
        input.close();

        let transform: Arc<dyn Transform<u64, u64>> = Arc::new(|x: u64| -> Result<u64, TransformError> {
            if x == 3 {
                Err(TransformError::new("bad frame"))
            } else {
                Ok(x)
            }
        });
        let report = WorkerPool::start(
            PoolConfig::new("p", 2).with_pop_timeout(TIMEOUT),
            transform,
            input,
            output.clone(),
            Signals::new(),
        )
        .unwrap()
        .join_all();

        assert_eq!(report.processed(), 4);
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 3);
        let indices: Vec<u64> = drain_sorted(&output).iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_panicking_transform_does_not_kill_worker() {
        let (input, output) = channels(8);
        for i in 0..4u64 {
            input.push(IndexedItem::new(i, i)).unwrap();
        }
        input.close();

        let transform: Arc<dyn Transform<u64, u64>> = Arc::new(|x: u64| -> Result<u64, TransformError> {
            if x == 1 {
                panic!("model exploded");
            }
            Ok(x)
        });
        let report = WorkerPool::start(
            PoolConfig::new("p", 1).with_pop_timeout(TIMEOUT),
            transform,
            input,
            output,
            Signals::new(),
        )
        .unwrap()
        .join_all();

        assert_eq!(report.processed(), 3);
        let failed = report.failed();
        assert_eq!(failed[0].index, 1);
        assert!(failed[0].reason.contains("model exploded"));
        assert_eq!(report.workers[0].exit, WorkerExit::InputClosed);
    }

    #[test]
    fn test_retry_policy_recovers_flaky_item() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let (input, output) = channels(8);
        input.push(IndexedItem::new(0, 7)).unwrap();
        input.close();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transform: Arc<dyn Transform<u64, u64>> = Arc::new(move |x: u64| -> Result<u64, TransformError> {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransformError::new("transient"))
            } else {
                Ok(x)
            }
        });

        let report = WorkerPool::start(
            PoolConfig::new("p", 1)
                .with_pop_timeout(TIMEOUT)
                .with_failure_policy(FailurePolicy::Retry { max_attempts: 3 }),
            transform,
            input,
            output.clone(),
            Signals::new(),
        )
        .unwrap()
        .join_all();

        assert_eq!(report.processed(), 1);
        assert_eq!(report.retried(), 2);
        assert!(report.failed().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fail_batch_raises_fatal() {
        let (input, output) = channels(8);
        input.push(IndexedItem::new(0, 1)).unwrap();

        let signals = Signals::new();
        let transform: Arc<dyn Transform<u64, u64>> =
            Arc::new(|_: u64| -> Result<u64, TransformError> { Err(TransformError::new("corrupt")) });
        let report = WorkerPool::start(
            PoolConfig::new("infer", 2)
                .with_pop_timeout(TIMEOUT)
                .with_failure_policy(FailurePolicy::FailBatch),
            transform,
            input,
            output,
            signals.clone(),
        )
        .unwrap()
        .join_all();

        assert!(signals.is_fatal());
        assert!(report.workers.iter().all(|w| w.exit == WorkerExit::Aborted));
        let cause = signals.fatal_cause().unwrap();
        assert_eq!(cause.source_id.as_deref(), Some("infer"));
    }

    #[test]
    fn test_fatal_aborts_without_draining() {
        let (input, output) = channels(8);
        for i in 0..5u64 {
            input.push(IndexedItem::new(i, i)).unwrap();
        }
        let signals = Signals::new();
        signals.raise_fatal(FatalCause::new("test", "camera gone"));

        let report = WorkerPool::start(
            PoolConfig::new("p", 2).with_pop_timeout(TIMEOUT),
            double(),
            input.clone(),
            output,
            signals,
        )
        .unwrap()
        .join_all();

        assert_eq!(report.processed(), 0);
        assert_eq!(input.len(), 5);
    }

    #[test]
    fn test_worker_exits_within_one_timeout_of_stop() {
        let (input, output) = channels(4);
        let signals = Signals::new();
        let timeout = Duration::from_millis(100);
        let pool = WorkerPool::start(
            PoolConfig::new("p", 1).with_pop_timeout(timeout),
            double(),
            input,
            output,
            signals.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        let stop_at = Instant::now();
        signals.request_stop();
        pool.join_all();

        assert!(stop_at.elapsed() < timeout * 3);
    }
}
