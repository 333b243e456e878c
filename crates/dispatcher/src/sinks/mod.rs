//! Sink implementations
//!
//! Contains LogSink, FileSink and the in-memory sinks used by tests and demos.

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FrameManifest};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, RecordingLiveSink};
