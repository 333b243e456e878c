//! Batch collector thread: moves worker results into the reassembly table.
//!
//! Pops with a timeout until the result channel is closed and drained, or
//! until the fatal signal is raised. Rejected writes (duplicate or
//! out-of-range index) are logged and counted, never fatal.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{IndexedItem, Signals};
use ingestion::{BoundedChannel, PopError};
use observability::metrics::{record_accept_rejected, record_reassembly_progress};
use tracing::{debug, warn};

use crate::{AcceptError, ReassemblyTable};

/// Why the collector stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorExit {
    /// Result channel closed and fully drained
    Drained,
    /// Fatal signal observed; remaining results abandoned
    Aborted,
    /// The collector thread panicked
    Panicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorReport {
    pub accepted: u64,
    pub duplicates: u64,
    pub out_of_range: u64,
    pub exit: CollectorExit,
}

/// Single reassembly thread for the batch topology
pub struct BatchCollector<T> {
    table: Arc<ReassemblyTable<T>>,
    input: BoundedChannel<IndexedItem<T>>,
    signals: Signals,
    pop_timeout: Duration,
}

impl<T: Send + Sync + 'static> BatchCollector<T> {
    pub fn new(
        table: Arc<ReassemblyTable<T>>,
        input: BoundedChannel<IndexedItem<T>>,
        signals: Signals,
        pop_timeout: Duration,
    ) -> Self {
        Self {
            table,
            input,
            signals,
            pop_timeout,
        }
    }

    /// Run on the calling thread until drained or aborted.
    pub fn run(self) -> CollectorReport {
        let mut report = CollectorReport {
            accepted: 0,
            duplicates: 0,
            out_of_range: 0,
            exit: CollectorExit::Drained,
        };

        loop {
            if self.signals.is_fatal() {
                report.exit = CollectorExit::Aborted;
                break;
            }

            match self.input.pop_timeout(self.pop_timeout) {
                Ok(item) => {
                    let index = item.index;
                    match self.table.accept(item) {
                        Ok(()) => {
                            report.accepted += 1;
                            record_reassembly_progress(self.table.filled(), self.table.len());
                        }
                        Err(e @ AcceptError::Duplicate { .. }) => {
                            report.duplicates += 1;
                            record_accept_rejected("duplicate");
                            warn!(index, error = %e, "duplicate result ignored");
                        }
                        Err(e @ AcceptError::OutOfRange { .. }) => {
                            report.out_of_range += 1;
                            record_accept_rejected("out_of_range");
                            warn!(index, error = %e, "result outside expected range ignored");
                        }
                    }
                }
                Err(PopError::Empty) => continue,
                Err(PopError::Closed) => break,
            }
        }

        debug!(
            accepted = report.accepted,
            filled = self.table.filled(),
            expected = self.table.len(),
            exit = ?report.exit,
            "collector finished"
        );
        report
    }

    /// Run on a dedicated `collector` thread.
    ///
    /// # Errors
    /// Thread creation failure.
    pub fn spawn(self) -> std::io::Result<CollectorHandle> {
        let join = thread::Builder::new()
            .name("collector".to_string())
            .spawn(move || self.run())?;
        Ok(CollectorHandle { join })
    }
}

#[derive(Debug)]
pub struct CollectorHandle {
    join: JoinHandle<CollectorReport>,
}

impl CollectorHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn join(self) -> CollectorReport {
        self.join.join().unwrap_or(CollectorReport {
            accepted: 0,
            duplicates: 0,
            out_of_range: 0,
            exit: CollectorExit::Panicked,
        })
    }
}
