//! Run reports

use std::fmt;
use std::time::Duration;

use contracts::SourceId;
use dispatcher::{FailedItem, PoolReport};
use ingestion::{ChannelStats, ProducerExit};
use observability::LiveSummary;
use reassembly::CollectorReport;

/// Per-channel outcome of a live run
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReport {
    pub source_id: SourceId,

    /// Items the producer pushed
    pub produced: u64,

    /// Index of the last item the producer generated
    pub last_produced: Option<u64>,

    /// Index of the freshest item taken out of the channel
    pub last_delivered: Option<u64>,

    /// Items overwritten in the channel before the render loop saw them
    pub evicted: u64,

    pub exit: ProducerExit,
}

/// Statistics from a live run
#[derive(Debug, Clone)]
pub struct LiveReport {
    pub ticks: u64,
    pub duration: Duration,
    pub channels: Vec<ChannelReport>,
    pub summary: LiveSummary,
}

impl LiveReport {
    pub fn channel(&self, source_id: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.source_id == source_id)
    }

    /// Render ticks per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl fmt::Display for LiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Duration: {:.2}s", self.duration.as_secs_f64())?;
        writeln!(f, "Ticks: {} ({:.2} fps)", self.ticks, self.fps())?;
        for c in &self.channels {
            let fmt_index = |i: Option<u64>| i.map_or_else(|| "-".to_string(), |i| i.to_string());
            writeln!(
                f,
                "  {}: produced={} last_produced={} last_delivered={} evicted={}",
                c.source_id,
                c.produced,
                fmt_index(c.last_produced),
                fmt_index(c.last_delivered),
                c.evicted
            )?;
        }
        write!(f, "{}", self.summary)
    }
}

/// Statistics from a batch run
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Expected item count N
    pub total: usize,

    /// Items handed to the sink
    pub written: usize,

    /// Indices never reassembled, ascending
    pub missing: Vec<u64>,

    /// Items the pool gave up on, with causes
    pub failed: Vec<FailedItem>,

    pub pool: PoolReport,
    pub collector: CollectorReport,
    pub input: ChannelStats,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items: {} total, {} written", self.total, self.written)?;
        writeln!(
            f,
            "Workers: {} (processed={}, retried={})",
            self.pool.workers.len(),
            self.pool.processed(),
            self.pool.retried()
        )?;
        writeln!(f, "Transform latency (ms): {}", observability::StatsSummary::from(&self.pool.latency_ms()))?;
        if !self.missing.is_empty() {
            writeln!(f, "Missing indices: {:?}", self.missing)?;
        }
        for item in &self.failed {
            writeln!(f, "  failed #{}: {}", item.index, item.reason)?;
        }
        write!(f, "Time taken: {:.2} seconds", self.elapsed.as_secs_f64())
    }
}
