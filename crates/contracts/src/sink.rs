//! Output sink interfaces
//!
//! Live mode renders the freshest value per channel once per tick.
//! Batch mode receives the fully reassembled sequence exactly once.

use crate::{Frame, IndexedItem, SourceId, WriteError};

/// Latest known value of one live channel at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReading<T> {
    pub source_id: SourceId,

    /// Last value seen on this channel, `None` until the first one arrives
    pub latest: Option<IndexedItem<T>>,

    /// `true` if `latest` was delivered during this tick, `false` if retained
    pub fresh: bool,
}

impl<T> ChannelReading<T> {
    pub fn empty(source_id: SourceId) -> Self {
        Self {
            source_id,
            latest: None,
            fresh: false,
        }
    }
}

/// Everything the renderer sees on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    /// Render tick counter, starting at 0
    pub tick: u64,

    /// Scalar sensor channels, in configuration order
    pub sensors: Vec<ChannelReading<u64>>,

    /// Camera channel, if the topology has one
    pub camera: Option<ChannelReading<Frame>>,
}

impl LiveView {
    /// Overlay line drawn over the camera image, e.g. `Sensor1: 4  Sensor2: 1  Sensor3: 0`
    ///
    /// Channels without a value yet render as `-`.
    pub fn overlay_text(&self) -> String {
        self.sensors
            .iter()
            .enumerate()
            .map(|(i, r)| match &r.latest {
                Some(item) => format!("Sensor{}: {}", i + 1, item.value),
                None => format!("Sensor{}: -", i + 1),
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Live render target (display window, log line, ...)
pub trait LiveSink: Send {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Draw one tick. Must not block on producers.
    fn render(&mut self, view: &LiveView);

    /// Release display resources at teardown
    fn close(&mut self) {}
}

/// Batch persistence target (video muxer, file writer, ...)
pub trait BatchSink<T>: Send {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Persist the ordered sequence in one traversal
    ///
    /// # Errors
    /// Any failure is fatal for the run.
    fn write_ordered(&mut self, items: &[T]) -> Result<(), WriteError>;
}
