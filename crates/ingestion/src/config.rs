//! Channel configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

pub use contracts::OverflowPolicy;

/// Bounded channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Fixed capacity, must be >= 1
    pub capacity: usize,

    /// Behaviour of `push` on a full channel
    pub policy: OverflowPolicy,
}

impl ChannelConfig {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self { capacity, policy }
    }

    /// Lossless: pushers wait for space
    pub fn blocking(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::Block)
    }

    /// Lossy: the oldest queued item is evicted to admit the newest
    pub fn drop_oldest(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::DropOldest)
    }
}

/// Per-channel counters
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    pushed: AtomicU64,
    popped: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_pushed(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_popped(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Items accepted by `push`
    pub pushed: u64,

    /// Items handed out by `pop`
    pub popped: u64,

    /// Items discarded by the drop-oldest policy
    pub evicted: u64,

    /// Pushes refused because the channel was closed
    pub rejected: u64,
}
