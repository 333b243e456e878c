//! Bounded multi-producer multi-consumer channel.
//!
//! A `HeapRb` ring guarded by one mutex, with two condition variables for
//! "became non-empty" and "became non-full". The overflow policy decides what
//! a push does on a full ring:
//! - `Block`: wait on `not_full` until a pop frees a slot or the channel closes
//! - `DropOldest`: overwrite the oldest slot in place (one atomic step under the lock)
//!
//! Consumers only ever wait with a timeout, so a consumer blocked on an empty
//! channel gets control back at least once per timeout to look at stop signals.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use metrics::counter;
use ringbuf::{traits::*, HeapRb};
use tracing::trace;

use crate::config::{ChannelConfig, ChannelMetrics, ChannelStats, OverflowPolicy};
use crate::error::{IngestionError, Result};

/// Successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item queued, nothing lost
    Enqueued,
    /// Item queued after evicting the oldest one
    Evicted,
}

/// Rejected push; the item is handed back to the caller.
#[derive(PartialEq, Eq)]
pub enum PushError<T> {
    /// Channel closed, no further pushes succeed
    Closed(T),
    /// Only from `try_push` on a full `Block` channel
    Full(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Closed(item) | Self::Full(item) => item,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(_) => f.write_str("PushError::Closed(..)"),
            Self::Full(_) => f.write_str("PushError::Full(..)"),
        }
    }
}

/// Pop returned no item. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// Nothing arrived within the timeout; retry later
    Empty,
    /// Closed and fully drained; terminal
    Closed,
}

/// Anything the shutdown coordinator can close without knowing its item type.
pub trait Closable: Send + Sync {
    fn name(&self) -> &str;
    fn close(&self);
    fn is_closed(&self) -> bool;
    fn stats(&self) -> ChannelStats;
}

struct State<T> {
    ring: HeapRb<T>,
    closed: bool,
}

struct Shared<T> {
    name: String,
    policy: OverflowPolicy,
    capacity: usize,
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    metrics: ChannelMetrics,
}

/// Fixed-capacity queue with an explicit overflow policy.
///
/// Cloning yields another handle to the same queue.
pub struct BoundedChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedChannel")
            .field("name", &self.shared.name)
            .field("policy", &self.shared.policy)
            .field("capacity", &self.shared.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> BoundedChannel<T> {
    /// Create a channel.
    ///
    /// # Errors
    /// `InvalidCapacity` when `config.capacity == 0`.
    pub fn new(name: impl Into<String>, config: ChannelConfig) -> Result<Self> {
        let name = name.into();
        if config.capacity == 0 {
            return Err(IngestionError::InvalidCapacity {
                channel: name,
                capacity: 0,
            });
        }

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                policy: config.policy,
                capacity: config.capacity,
                state: Mutex::new(State {
                    ring: HeapRb::new(config.capacity),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                metrics: ChannelMetrics::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Every guarded state is consistent between statements, so a poisoned
    /// lock is still usable.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an item according to the overflow policy.
    ///
    /// `Block` waits for space; `DropOldest` never waits.
    ///
    /// # Errors
    /// `PushError::Closed` with the item if the channel is (or becomes) closed.
    pub fn push(&self, item: T) -> std::result::Result<PushOutcome, PushError<T>> {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            self.shared.metrics.record_rejected();
            return Err(PushError::Closed(item));
        }

        match self.shared.policy {
            OverflowPolicy::DropOldest => {
                let evicted = state.ring.push_overwrite(item);
                drop(state);
                self.shared.not_empty.notify_one();
                self.shared.metrics.record_pushed();
                match evicted {
                    Some(old) => {
                        drop(old);
                        self.record_eviction();
                        Ok(PushOutcome::Evicted)
                    }
                    None => Ok(PushOutcome::Enqueued),
                }
            }
            OverflowPolicy::Block => {
                while state.ring.is_full() && !state.closed {
                    state = self
                        .shared
                        .not_full
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if state.closed {
                    drop(state);
                    self.shared.metrics.record_rejected();
                    return Err(PushError::Closed(item));
                }
                self.enqueue(state, item)
            }
        }
    }

    /// Push without waiting. A full `Block` channel returns `PushError::Full`.
    pub fn try_push(&self, item: T) -> std::result::Result<PushOutcome, PushError<T>> {
        if self.shared.policy == OverflowPolicy::DropOldest {
            return self.push(item);
        }
        let state = self.lock();
        if state.closed {
            drop(state);
            self.shared.metrics.record_rejected();
            return Err(PushError::Closed(item));
        }
        self.enqueue(state, item)
    }

    fn enqueue(
        &self,
        mut state: MutexGuard<'_, State<T>>,
        item: T,
    ) -> std::result::Result<PushOutcome, PushError<T>> {
        match state.ring.try_push(item) {
            Ok(()) => {
                drop(state);
                self.shared.not_empty.notify_one();
                self.shared.metrics.record_pushed();
                Ok(PushOutcome::Enqueued)
            }
            Err(item) => Err(PushError::Full(item)),
        }
    }

    fn record_eviction(&self) {
        self.shared.metrics.record_evicted();
        counter!("framepipe_channel_evicted_total", "channel" => self.shared.name.clone())
            .increment(1);
        trace!(channel = %self.shared.name, "evicted oldest item");
    }

    /// Pop one item, waiting at most `timeout`.
    ///
    /// Items still queued after `close()` are returned before `Closed`.
    ///
    /// # Errors
    /// `PopError::Empty` on timeout, `PopError::Closed` once closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> std::result::Result<T, PopError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(item) = state.ring.try_pop() {
                drop(state);
                self.on_popped();
                return Ok(item);
            }
            if state.closed {
                return Err(PopError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PopError::Empty);
            }
            let (guard, _) = self
                .shared
                .not_empty
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> std::result::Result<T, PopError> {
        let mut state = self.lock();
        match state.ring.try_pop() {
            Some(item) => {
                drop(state);
                self.on_popped();
                Ok(item)
            }
            None if state.closed => Err(PopError::Closed),
            None => Err(PopError::Empty),
        }
    }

    fn on_popped(&self) {
        self.shared.not_full.notify_one();
        self.shared.metrics.record_popped();
    }

    /// Close the channel and wake every waiter. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        trace!(channel = %self.shared.name, "channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_full(&self) -> bool {
        self.lock().ring.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().ring.occupied_len()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.metrics.snapshot()
    }
}

impl<T: Send> Closable for BoundedChannel<T> {
    fn name(&self) -> &str {
        BoundedChannel::name(self)
    }

    fn close(&self) {
        BoundedChannel::close(self)
    }

    fn is_closed(&self) -> bool {
        BoundedChannel::is_closed(self)
    }

    fn stats(&self) -> ChannelStats {
        BoundedChannel::stats(self)
    }
}
