//! ShutdownCoordinator - Running → Draining → Stopped
//!
//! Observes the two broadcast signals and drives teardown in a fixed order:
//! signal first, then workers, then readers, then the writer. A fatal signal
//! closes every registered channel at once so no thread stays blocked on a
//! push or pop that will never complete.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::Signals;
use ingestion::{ChannelStats, Closable};
use tracing::{debug, info, instrument, warn};

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Both signals unset
    Running,
    /// A signal was observed; `fatal` means abort instead of drain
    Draining { fatal: bool },
    /// Every thread joined. Terminal.
    Stopped { fatal: bool },
}

impl ShutdownState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Draining { fatal: true } | Self::Stopped { fatal: true }
        )
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining { fatal: false } => write!(f, "draining"),
            Self::Draining { fatal: true } => write!(f, "draining (fatal)"),
            Self::Stopped { fatal: false } => write!(f, "stopped"),
            Self::Stopped { fatal: true } => write!(f, "stopped (fatal)"),
        }
    }
}

/// Owns the pipeline's signals and every channel that may need force-closing
pub struct ShutdownCoordinator {
    signals: Signals,
    channels: Vec<Arc<dyn Closable>>,
    state: ShutdownState,
}

impl ShutdownCoordinator {
    pub fn new(signals: Signals) -> Self {
        Self {
            signals,
            channels: Vec::new(),
            state: ShutdownState::Running,
        }
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Register a channel to be closed on fatal abort and at teardown.
    pub fn register_channel(&mut self, channel: impl Closable + 'static) {
        self.channels.push(Arc::new(channel));
    }

    /// Snapshot of every registered channel, in registration order
    pub fn channel_stats(&self) -> Vec<(String, ChannelStats)> {
        self.channels
            .iter()
            .map(|c| (c.name().to_string(), c.stats()))
            .collect()
    }

    /// Fold the current signal values into the state machine.
    pub fn observe(&mut self) -> ShutdownState {
        let next = match self.state {
            ShutdownState::Running if self.signals.is_fatal() => ShutdownState::Draining { fatal: true },
            ShutdownState::Running if self.signals.stop_requested() => {
                ShutdownState::Draining { fatal: false }
            }
            ShutdownState::Draining { fatal: false } if self.signals.is_fatal() => {
                ShutdownState::Draining { fatal: true }
            }
            other => other,
        };

        if next != self.state {
            self.transition(next);
        }
        self.state
    }

    /// External stop (user quit, Ctrl+C, time limit reached)
    pub fn request_stop(&mut self) -> ShutdownState {
        if self.signals.request_stop() {
            debug!("stop requested");
        }
        self.observe()
    }

    /// Poll every `interval` until a signal is observed or `done` returns true.
    pub fn wait_until(&mut self, interval: Duration, mut done: impl FnMut() -> bool) -> ShutdownState {
        loop {
            let state = self.observe();
            if !state.is_running() || done() {
                return state;
            }
            thread::sleep(interval);
        }
    }

    /// Close every registered channel. Idempotent.
    pub fn close_channels(&self) {
        for channel in &self.channels {
            if !channel.is_closed() {
                channel.close();
                debug!(channel = channel.name(), "channel closed");
            }
        }
    }

    /// Join in the fixed order workers → producers → writer.
    ///
    /// The stop signal is set first if nothing else has. Channels are closed
    /// after the workers have drained, so producers blocked on a full channel
    /// wake up before they are joined, and the writer sees end-of-stream.
    #[instrument(name = "shutdown_teardown", skip_all, fields(channels = self.channels.len()))]
    pub fn teardown<W, P, R>(
        &mut self,
        join_workers: impl FnOnce() -> W,
        join_producers: impl FnOnce() -> P,
        join_writer: impl FnOnce() -> R,
    ) -> (W, P, R) {
        let started = Instant::now();
        if self.observe().is_running() {
            self.request_stop();
        }

        let workers = join_workers();
        self.close_channels();
        let producers = join_producers();
        let writer = join_writer();

        // a late fatal (e.g. a worker under FailBatch) still counts
        let fatal = self.observe().is_fatal();
        self.transition(ShutdownState::Stopped { fatal });
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "teardown complete");

        (workers, producers, writer)
    }

    fn transition(&mut self, next: ShutdownState) {
        match next {
            ShutdownState::Draining { fatal: true } => {
                match self.signals.fatal_cause() {
                    Some(cause) => warn!(%cause, "fatal signal observed, aborting"),
                    None => warn!("fatal signal observed, aborting"),
                }
                self.close_channels();
            }
            ShutdownState::Draining { fatal: false } => info!("stop signal observed, draining"),
            ShutdownState::Stopped { .. } => info!(state = %next, "pipeline stopped"),
            ShutdownState::Running => {}
        }
        self.state = next;
    }
}
