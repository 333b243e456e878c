//! Producer - drives one `DataSource` into one `BoundedChannel`.
//!
//! Runs on its own named thread. The source handle is opened at the start of
//! `run` and owned by a guard whose `Drop` closes it, so the handle is
//! released on every exit path, including unwinding out of `read_next`.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use contracts::{
    DataSource, Exhaustion, FatalCause, IndexedItem, Signals, SourceError, SourceId,
};
use metrics::counter;
use tracing::{debug, error, info, trace};

use crate::channel::{BoundedChannel, PushOutcome};
use crate::error::{IngestionError, Result};

/// Why a producer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerExit {
    /// A stop signal was observed at a loop boundary
    Stopped,
    /// The source reported `EndOfStream`
    Exhausted,
    /// Open or read failure; the fatal signal was raised
    Failed(String),
    /// The output channel was closed under the producer
    OutputClosed,
    /// The source panicked; the fatal signal was raised
    Panicked,
}

/// Summary returned by `ProducerHandle::join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub source_id: SourceId,

    /// Items pushed into the output channel
    pub produced: u64,

    /// Index of the last pushed item
    pub last_index: Option<u64>,

    pub exit: ProducerExit,
}

/// Scoped ownership of an open source handle.
struct HandleGuard<'a, S: DataSource> {
    source: &'a mut S,
    handle: Option<S::Handle>,
}

impl<'a, S: DataSource> HandleGuard<'a, S> {
    fn open(source: &'a mut S) -> std::result::Result<Self, SourceError> {
        let handle = source.open()?;
        Ok(Self {
            source,
            handle: Some(handle),
        })
    }

    fn read_next(&mut self) -> std::result::Result<S::Item, SourceError> {
        match self.handle.as_mut() {
            Some(handle) => self.source.read_next(handle),
            None => Err(SourceError::read(self.source.source_id(), "handle released")),
        }
    }
}

impl<S: DataSource> Drop for HandleGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.close(handle);
            debug!(source_id = %self.source.source_id(), "source handle released");
        }
    }
}

/// Repeatedly reads its source and pushes indexed items into `output`.
pub struct Producer<S: DataSource> {
    source: S,
    output: BoundedChannel<IndexedItem<S::Item>>,
    signals: Signals,
}

impl<S: DataSource> Producer<S> {
    pub fn new(source: S, output: BoundedChannel<IndexedItem<S::Item>>, signals: Signals) -> Self {
        Self {
            source,
            output,
            signals,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        self.source.source_id()
    }

    /// Run to completion on the calling thread.
    ///
    /// Continues while no stop signal is set and the source yields items.
    /// Indices start at 0 and increase by one per pushed item. The output
    /// channel is closed on return.
    pub fn run(self) -> ProducerReport {
        let Producer {
            mut source,
            output,
            signals,
        } = self;
        let source_id = source.source_id().clone();
        let exhaustion = source.exhaustion();

        let mut produced = 0u64;
        let exit = Self::pump(&mut source, &output, &signals, &mut produced);

        match &exit {
            ProducerExit::Exhausted => match exhaustion {
                Exhaustion::Graceful => {
                    info!(source_id = %source_id, produced, "source exhausted, requesting stop");
                    signals.request_stop();
                }
                Exhaustion::Fatal => {
                    error!(source_id = %source_id, produced, "source ended unexpectedly");
                    signals.raise_fatal(
                        FatalCause::new("producer", "unexpected end of stream")
                            .with_source(source_id.as_str()),
                    );
                }
                Exhaustion::Quiet => {
                    info!(source_id = %source_id, produced, "source exhausted");
                }
            },
            ProducerExit::Failed(message) => {
                error!(source_id = %source_id, error = %message, "source failed");
                signals.raise_fatal(
                    FatalCause::new("producer", message.clone()).with_source(source_id.as_str()),
                );
            }
            ProducerExit::Stopped | ProducerExit::OutputClosed | ProducerExit::Panicked => {
                debug!(source_id = %source_id, produced, exit = ?exit, "producer exiting");
            }
        }

        output.close();
        ProducerReport {
            source_id,
            produced,
            last_index: produced.checked_sub(1),
            exit,
        }
    }

    /// Open, read and push until something ends the loop. The guard is
    /// dropped (and the handle closed) before this returns.
    fn pump(
        source: &mut S,
        output: &BoundedChannel<IndexedItem<S::Item>>,
        signals: &Signals,
        produced: &mut u64,
    ) -> ProducerExit {
        let mut guard = match HandleGuard::open(source) {
            Ok(guard) => guard,
            Err(e) => return ProducerExit::Failed(e.to_string()),
        };

        loop {
            if signals.should_stop() {
                return ProducerExit::Stopped;
            }

            let value = match guard.read_next() {
                Ok(value) => value,
                Err(SourceError::EndOfStream { .. }) => return ProducerExit::Exhausted,
                Err(e) => return ProducerExit::Failed(e.to_string()),
            };

            let index = *produced;
            match output.push(IndexedItem::new(index, value)) {
                Ok(PushOutcome::Enqueued) => {}
                Ok(PushOutcome::Evicted) => {
                    trace!(channel = output.name(), index, "live channel overwrote stale item");
                }
                Err(_) => return ProducerExit::OutputClosed,
            }
            *produced += 1;
            counter!("framepipe_items_produced_total", "channel" => output.name().to_string())
                .increment(1);
        }
    }
}

impl<S> Producer<S>
where
    S: DataSource + 'static,
{
    /// Run on a dedicated named thread.
    ///
    /// A panic inside the source is contained: the fatal signal is raised and
    /// the output channel is closed so downstream consumers terminate.
    pub fn spawn(self) -> Result<ProducerHandle> {
        let source_id = self.source_id().clone();
        let name = format!("producer-{source_id}");
        let output = self.output.clone();
        let signals = self.signals.clone();
        let id = source_id.clone();

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                panic::catch_unwind(AssertUnwindSafe(move || self.run())).unwrap_or_else(|_| {
                    error!(source_id = %id, "producer panicked");
                    signals.raise_fatal(
                        FatalCause::new("producer", "panic in data source").with_source(id.as_str()),
                    );
                    output.close();
                    ProducerReport {
                        source_id: id,
                        produced: 0,
                        last_index: None,
                        exit: ProducerExit::Panicked,
                    }
                })
            })
            .map_err(|source| IngestionError::Spawn { name, source })?;

        Ok(ProducerHandle { source_id, join })
    }
}

/// Join handle of a spawned producer.
#[derive(Debug)]
pub struct ProducerHandle {
    source_id: SourceId,
    join: JoinHandle<ProducerReport>,
}

impl ProducerHandle {
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the thread. Never panics.
    pub fn join(self) -> ProducerReport {
        let source_id = self.source_id;
        self.join.join().unwrap_or_else(|_| ProducerReport {
            source_id,
            produced: 0,
            last_index: None,
            exit: ProducerExit::Panicked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PopError;
    use crate::config::ChannelConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Yields `0..len`, then ends; optionally fails at `fail_at`.
    struct Counting {
        id: SourceId,
        len: u64,
        next: u64,
        fail_at: Option<u64>,
        exhaustion: Exhaustion,
        open_fails: bool,
        closes: Arc<AtomicUsize>,
    }

    impl Counting {
        fn new(len: u64, exhaustion: Exhaustion) -> Self {
            Self {
                id: "counting".into(),
                len,
                next: 0,
                fail_at: None,
                exhaustion,
                open_fails: false,
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DataSource for Counting {
        type Item = u64;
        type Handle = ();

        fn source_id(&self) -> &SourceId {
            &self.id
        }

        fn exhaustion(&self) -> Exhaustion {
            self.exhaustion
        }

        fn open(&mut self) -> std::result::Result<(), SourceError> {
            if self.open_fails {
                return Err(SourceError::open(&self.id, "unavailable"));
            }
            Ok(())
        }

        fn read_next(&mut self, _: &mut ()) -> std::result::Result<u64, SourceError> {
            if self.fail_at == Some(self.next) {
                return Err(SourceError::read(&self.id, "bad sector"));
            }
            if self.next == self.len {
                return Err(SourceError::end_of_stream(&self.id));
            }
            self.next += 1;
            Ok(self.next - 1)
        }

        fn close(&mut self, _: ()) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn channel(cap: usize) -> BoundedChannel<IndexedItem<u64>> {
        BoundedChannel::new("out", ChannelConfig::blocking(cap)).unwrap()
    }

    #[test]
    fn test_graceful_exhaustion_requests_stop() {
        let out = channel(16);
        let signals = Signals::new();
        let source = Counting::new(5, Exhaustion::Graceful);
        let closes = Arc::clone(&source.closes);

        let report = Producer::new(source, out.clone(), signals.clone()).run();

        assert_eq!(report.exit, ProducerExit::Exhausted);
        assert_eq!(report.produced, 5);
        assert_eq!(report.last_index, Some(4));
        assert!(signals.stop_requested());
        assert!(!signals.is_fatal());
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let items: Vec<_> = std::iter::from_fn(|| out.try_pop().ok()).collect();
        let indices: Vec<u64> = items.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.try_pop(), Err(PopError::Closed));
    }

    #[test]
    fn test_fatal_exhaustion_raises_fatal() {
        let signals = Signals::new();
        let report = Producer::new(Counting::new(2, Exhaustion::Fatal), channel(4), signals.clone()).run();

        assert_eq!(report.exit, ProducerExit::Exhausted);
        assert!(signals.is_fatal());
        let cause = signals.fatal_cause().unwrap();
        assert_eq!(cause.source_id.as_deref(), Some("counting"));
    }

    #[test]
    fn test_quiet_exhaustion_signals_nothing() {
        let signals = Signals::new();
        let report = Producer::new(Counting::new(3, Exhaustion::Quiet), channel(4), signals.clone()).run();

        assert_eq!(report.exit, ProducerExit::Exhausted);
        assert!(!signals.should_stop());
    }

    #[test]
    fn test_read_error_releases_handle_and_raises_fatal() {
        let signals = Signals::new();
        let mut source = Counting::new(10, Exhaustion::Graceful);
        source.fail_at = Some(3);
        let closes = Arc::clone(&source.closes);

        let report = Producer::new(source, channel(16), signals.clone()).run();

        assert!(matches!(report.exit, ProducerExit::Failed(_)));
        assert_eq!(report.produced, 3);
        assert!(signals.is_fatal());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_error_never_closes() {
        let signals = Signals::new();
        let mut source = Counting::new(10, Exhaustion::Fatal);
        source.open_fails = true;
        let closes = Arc::clone(&source.closes);
        let out = channel(4);

        let report = Producer::new(source, out.clone(), signals.clone()).run();

        assert!(matches!(report.exit, ProducerExit::Failed(ref m) if m.contains("unavailable")));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(signals.is_fatal());
        assert!(out.is_closed());
    }

    #[test]
    fn test_stop_signal_ends_infinite_source() {
        let out = BoundedChannel::new("live", ChannelConfig::drop_oldest(1)).unwrap();
        let signals = Signals::new();
        let handle = Producer::new(Counting::new(u64::MAX, Exhaustion::Fatal), out.clone(), signals.clone())
            .spawn()
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        signals.request_stop();
        let report = handle.join();

        assert_eq!(report.exit, ProducerExit::Stopped);
        assert!(report.produced > 0);
        assert!(!signals.is_fatal());
        let last = out.try_pop().unwrap();
        assert_eq!(Some(last.index), report.last_index);
    }

    #[test]
    fn test_closed_output_ends_producer() {
        let out = channel(1);
        out.close();
        let signals = Signals::new();
        let report = Producer::new(Counting::new(5, Exhaustion::Graceful), out, signals.clone()).run();

        assert_eq!(report.exit, ProducerExit::OutputClosed);
        assert_eq!(report.produced, 0);
        assert!(!signals.should_stop());
    }

    struct Exploding {
        id: SourceId,
        closed: Arc<AtomicUsize>,
    }

    impl DataSource for Exploding {
        type Item = u64;
        type Handle = ();

        fn source_id(&self) -> &SourceId {
            &self.id
        }

        fn exhaustion(&self) -> Exhaustion {
            Exhaustion::Graceful
        }

        fn open(&mut self) -> std::result::Result<(), SourceError> {
            Ok(())
        }

        fn read_next(&mut self, _: &mut ()) -> std::result::Result<u64, SourceError> {
            panic!("driver crashed");
        }

        fn close(&mut self, _: ()) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_panicking_source_contained() {
        let closed = Arc::new(AtomicUsize::new(0));
        let out = channel(1);
        let signals = Signals::new();
        let source = Exploding {
            id: "boom".into(),
            closed: Arc::clone(&closed),
        };

        let report = Producer::new(source, out.clone(), signals.clone())
            .spawn()
            .unwrap()
            .join();

        assert_eq!(report.exit, ProducerExit::Panicked);
        assert!(signals.is_fatal());
        assert!(out.is_closed());
        assert_eq!(closed.load(Ordering::SeqCst), 1, "guard must close during unwind");
    }
}
