//! Batch topology
//!
//! ```text
//! Producer(reader) ─► BoundedChannel(block, K) ─► WorkerPool(transform) ─► BoundedChannel(block)
//!                                                                             │
//!                                            ReassemblyTable[0, N) ◄─ collector
//!                                                     │
//!                                         write_ordered (driver thread)
//! ```
//!
//! The reader's end of stream requests a graceful stop; the pool drains the
//! input and the collector drains the results before the table is checked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{BatchConfig, BatchSink, DataSource, FailurePolicy, RuntimeConfig, Signals, Transform};
use dispatcher::{PoolConfig, WorkerPool};
use ingestion::{BoundedChannel, ChannelConfig, Producer};
use observability::record_batch_result;
use reassembly::{BatchCollector, ReassemblyOutcome, ReassemblyTable};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::shutdown::ShutdownCoordinator;
use crate::stats::BatchReport;

/// Batch run settings
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub workers: usize,
    pub input_channel: ChannelConfig,
    pub result_channel: ChannelConfig,

    /// Worker/collector pop timeout; bounds shutdown latency
    pub pop_timeout: Duration,

    /// How often the driver checks for reader completion
    pub poll_interval: Duration,

    pub failure_policy: FailurePolicy,

    /// Write the present items even if some are missing
    pub allow_partial: bool,
}

impl BatchSettings {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            input_channel: ChannelConfig::blocking(1000),
            result_channel: ChannelConfig::blocking(1000),
            pop_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
            failure_policy: FailurePolicy::Skip,
            allow_partial: false,
        }
    }

    pub fn from_config(batch: &BatchConfig, runtime: &RuntimeConfig) -> Self {
        Self {
            workers: batch.workers,
            input_channel: ChannelConfig::blocking(batch.input_queue_capacity),
            result_channel: ChannelConfig::blocking(batch.result_queue_capacity),
            pop_timeout: runtime.pop_timeout(),
            poll_interval: runtime.poll_interval(),
            failure_policy: batch.failure_policy,
            allow_partial: batch.allow_partial,
        }
    }

    pub fn with_input_capacity(mut self, capacity: usize) -> Self {
        self.input_channel = ChannelConfig::blocking(capacity);
        self
    }

    pub fn with_timeouts(mut self, pop_timeout: Duration, poll_interval: Duration) -> Self {
        self.pop_timeout = pop_timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }
}

/// Reader → pool → reassembly → ordered write
pub struct BatchPipeline {
    settings: BatchSettings,
    signals: Signals,
}

impl BatchPipeline {
    pub fn new(settings: BatchSettings, signals: Signals) -> Self {
        Self { settings, signals }
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Process every item of `source` and hand the ordered results to `sink` once.
    ///
    /// # Errors
    /// - `UnknownLength` if the source cannot report N up front
    /// - `Ingestion` / `Dispatcher` / `Spawn` if a thread or channel cannot be created
    /// - `Fatal` if any component raised the fatal signal
    /// - `Incomplete` if gaps remain and partial output is not allowed
    /// - `Write` if the sink fails
    #[instrument(
        name = "batch_pipeline_run",
        skip_all,
        fields(source = %source.source_id(), workers = self.settings.workers)
    )]
    pub fn run<S, U, K>(
        self,
        source: S,
        transform: Arc<dyn Transform<S::Item, U>>,
        sink: &mut K,
    ) -> Result<BatchReport>
    where
        S: DataSource + 'static,
        S::Item: Clone,
        U: Send + Sync + 'static,
        K: BatchSink<U> + ?Sized,
    {
        let started = Instant::now();
        let total = source
            .expected_len()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PipelineError::UnknownLength {
                source_id: source.source_id().clone(),
            })?;
        info!(total, transform = transform.name(), "starting batch pipeline");

        let input = BoundedChannel::new("input", self.settings.input_channel)?;
        let results = BoundedChannel::new("results", self.settings.result_channel)?;
        let table = Arc::new(ReassemblyTable::new(total));

        let mut coordinator = ShutdownCoordinator::new(self.signals.clone());
        coordinator.register_channel(input.clone());
        coordinator.register_channel(results.clone());

        let collector = BatchCollector::new(
            Arc::clone(&table),
            results.clone(),
            self.signals.clone(),
            self.settings.pop_timeout,
        )
        .spawn()
        .map_err(PipelineError::Spawn)?;

        let pool_config = PoolConfig::new("batch", self.settings.workers)
            .with_pop_timeout(self.settings.pop_timeout)
            .with_failure_policy(self.settings.failure_policy);
        let pool = match WorkerPool::start(
            pool_config,
            transform,
            input.clone(),
            results,
            self.signals.clone(),
        ) {
            Ok(pool) => pool,
            Err(e) => {
                coordinator.teardown(|| (), || (), || collector.join());
                return Err(e.into());
            }
        };

        let reader = match Producer::new(source, input.clone(), self.signals.clone()).spawn() {
            Ok(reader) => reader,
            Err(e) => {
                self.signals.raise_fatal(contracts::FatalCause::new("driver", e.to_string()));
                coordinator.teardown(|| pool.join_all(), || (), || collector.join());
                return Err(e.into());
            }
        };

        let state = coordinator.wait_until(self.settings.poll_interval, || {
            debug!(filled = table.filled(), total, "batch progress");
            reader.is_finished()
        });
        debug!(%state, "batch wait finished");

        let (pool_report, reader_report, collector_report) =
            coordinator.teardown(|| pool.join_all(), || reader.join(), || collector.join());
        debug!(?reader_report, ?collector_report, "batch threads joined");

        if let Some(cause) = self.signals.fatal_cause() {
            error!(%cause, "batch pipeline aborted");
            return Err(PipelineError::Fatal(cause.clone()));
        }

        let table = Arc::try_unwrap(table).map_err(|_| PipelineError::TableShared)?;
        let failed = pool_report.failed();
        let (written, missing) = match table.into_outcome() {
            ReassemblyOutcome::Complete(items) => {
                sink.write_ordered(&items)?;
                (items.len(), Vec::new())
            }
            ReassemblyOutcome::Incomplete { missing, present } => {
                warn!(
                    missing = missing.len(),
                    total,
                    first_missing = missing.first().copied(),
                    "reassembly incomplete"
                );
                if !self.settings.allow_partial {
                    record_batch_result(0, missing.len());
                    return Err(PipelineError::Incomplete { total, missing });
                }
                let items: Vec<U> = present.into_iter().map(|item| item.value).collect();
                sink.write_ordered(&items)?;
                (items.len(), missing)
            }
        };

        record_batch_result(written, missing.len());
        let report = BatchReport {
            total,
            written,
            missing,
            failed,
            pool: pool_report,
            collector: collector_report,
            input: input.stats(),
            elapsed: started.elapsed(),
        };
        info!(
            written,
            missing = report.missing.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch pipeline finished"
        );
        Ok(report)
    }
}
