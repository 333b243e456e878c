//! LogSink - renders live views and batch summaries via tracing

use contracts::{BatchSink, LiveSink, LiveView, WriteError};
use tracing::{debug, info, instrument};

/// Sink that logs the overlay line instead of drawing a window
pub struct LogSink {
    name: String,
    /// Log at `info` every N ticks, `debug` otherwise
    every: u64,
    rendered: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            rendered: 0,
        }
    }

    /// Only every `every`-th tick is logged at `info`
    pub fn with_every(mut self, every: u64) -> Self {
        self.every = every.max(1);
        self
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl LiveSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&mut self, view: &LiveView) {
        self.rendered += 1;
        let overlay = view.overlay_text();
        let camera_index = view
            .camera
            .as_ref()
            .and_then(|c| c.latest.as_ref())
            .map(|f| f.index);

        if view.tick % self.every == 0 {
            info!(sink = %self.name, tick = view.tick, camera_frame = ?camera_index, "{overlay}");
        } else {
            debug!(sink = %self.name, tick = view.tick, camera_frame = ?camera_index, "{overlay}");
        }
    }

    fn close(&mut self) {
        info!(sink = %self.name, rendered = self.rendered, "LogSink closed");
    }
}

impl<T: Send> BatchSink<T> for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_write", skip(self, items), fields(sink = %self.name))]
    fn write_ordered(&mut self, items: &[T]) -> Result<(), WriteError> {
        info!(sink = %self.name, items = items.len(), "ordered batch received");
        Ok(())
    }
}
