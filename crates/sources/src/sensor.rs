//! Simulated scalar sensor
//!
//! Each read waits `delay`, then returns the next value of a counter. The
//! first value is 1. Three of these at 10ms / 100ms / 1s feed the live view.

use std::thread;
use std::time::Duration;

use contracts::{DataSource, Exhaustion, SensorConfig, SourceError, SourceId};
use tracing::trace;

/// Timed counter sensor
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    id: SourceId,
    delay: Duration,
    limit: Option<u64>,
    value: u64,
}

impl SimulatedSensor {
    pub fn new(id: impl Into<SourceId>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
            limit: None,
            value: 0,
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.id.as_str(), config.delay()).with_limit(config.limit)
    }

    /// Stop after `limit` values (`None` = unbounded)
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl DataSource for SimulatedSensor {
    type Item = u64;
    type Handle = ();

    fn source_id(&self) -> &SourceId {
        &self.id
    }

    /// A finite sensor only empties its own slot; the live view keeps running.
    fn exhaustion(&self) -> Exhaustion {
        Exhaustion::Quiet
    }

    fn expected_len(&self) -> Option<u64> {
        self.limit
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.value = 0;
        Ok(())
    }

    fn read_next(&mut self, _: &mut ()) -> Result<u64, SourceError> {
        if self.limit.is_some_and(|limit| self.value >= limit) {
            return Err(SourceError::end_of_stream(&self.id));
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.value += 1;
        trace!(source_id = %self.id, value = self.value, "sensor read");
        Ok(self.value)
    }

    fn close(&mut self, _: ()) {}
}
