//! # Pipeline
//!
//! Wires channels, producers, the worker pool and the reassemblers into the
//! live or batch topology, and owns their lifecycle through the
//! `ShutdownCoordinator`.
//!
//! Teardown order is fixed: signal, workers, producers, writer.

pub mod batch;
pub mod driver;
pub mod error;
pub mod live;
pub mod shutdown;
pub mod stats;

pub use batch::{BatchPipeline, BatchSettings};
pub use driver::{LiveLimits, PipelineDriver, Topology};
pub use error::{PipelineError, Result};
pub use live::{LivePipeline, LiveSettings};
pub use shutdown::{ShutdownCoordinator, ShutdownState};
pub use stats::{BatchReport, ChannelReport, LiveReport};
