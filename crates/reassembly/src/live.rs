//! Live fan-in: one latest-value slot per channel.
//!
//! `collect` drains every attached channel without blocking, so the render
//! tick never waits on producer timing. Intermediate values that arrive
//! between two ticks are overwritten; only the freshest survives.

use contracts::{IndexedItem, SourceId};
use ingestion::{BoundedChannel, PopError};
use tracing::debug;

use crate::LatestSlot;

struct LiveChannel<T> {
    source_id: SourceId,
    input: Option<BoundedChannel<IndexedItem<T>>>,
    slot: LatestSlot<T>,
    closed: bool,
}

/// Result of one `collect` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
    /// Items moved from channels into slots
    pub accepted: usize,
    /// Channels that reported `Closed` for the first time
    pub newly_closed: usize,
}

/// Per-channel latest-value reassembler
pub struct LiveReassembler<T> {
    channels: Vec<LiveChannel<T>>,
}

impl<T> Default for LiveReassembler<T> {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
        }
    }
}

impl<T> LiveReassembler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel fed by a producer. Order of attachment is kept.
    pub fn attach(&mut self, source_id: SourceId, input: BoundedChannel<IndexedItem<T>>) {
        self.channels.push(LiveChannel {
            source_id,
            input: Some(input),
            slot: LatestSlot::new(),
            closed: false,
        });
    }

    /// Register a slot with no channel; fed only through `accept`.
    pub fn register(&mut self, source_id: SourceId) {
        self.channels.push(LiveChannel {
            source_id,
            input: None,
            slot: LatestSlot::new(),
            closed: false,
        });
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &SourceId> {
        self.channels.iter().map(|c| &c.source_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Overwrite the slot of `source_id`. Returns `false` for unknown ids.
    pub fn accept(&mut self, source_id: &str, item: IndexedItem<T>) -> bool {
        match self.channels.iter_mut().find(|c| c.source_id == source_id) {
            Some(channel) => {
                channel.slot.accept(item);
                true
            }
            None => false,
        }
    }

    /// Non-blocking drain of every attached channel into its slot.
    pub fn collect(&mut self) -> CollectSummary {
        let mut summary = CollectSummary::default();
        for channel in &mut self.channels {
            let Some(input) = &channel.input else {
                continue;
            };
            loop {
                match input.try_pop() {
                    Ok(item) => {
                        channel.slot.accept(item);
                        summary.accepted += 1;
                    }
                    Err(PopError::Empty) => break,
                    Err(PopError::Closed) => {
                        if !channel.closed {
                            channel.closed = true;
                            summary.newly_closed += 1;
                            debug!(source_id = %channel.source_id, "live channel closed");
                        }
                        break;
                    }
                }
            }
        }
        summary
    }

    /// Take the freshest value of `source_id`, leaving its slot absent.
    pub fn consume_if_present(&mut self, source_id: &str) -> Option<IndexedItem<T>> {
        self.channels
            .iter_mut()
            .find(|c| c.source_id == source_id)
            .and_then(|c| c.slot.consume_if_present())
    }

    /// Consume every slot, in attachment order.
    pub fn consume_all(&mut self) -> Vec<(SourceId, Option<IndexedItem<T>>)> {
        self.channels
            .iter_mut()
            .map(|c| (c.source_id.clone(), c.slot.consume_if_present()))
            .collect()
    }

    /// Every attached channel has been closed and drained
    pub fn all_closed(&self) -> bool {
        self.channels
            .iter()
            .filter(|c| c.input.is_some())
            .all(|c| c.closed)
    }

    /// Total values overwritten before consumption, across all slots
    pub fn overwritten(&self) -> u64 {
        self.channels.iter().map(|c| c.slot.overwritten()).sum()
    }
}
