//! # Dispatcher
//!
//! 并行处理与输出模块。
//!
//! 负责：
//! - `WorkerPool`：N 个工作线程共享一个输入通道，对每项应用同一变换
//! - 内置帧变换 (`identity` / `invert` / `grayscale`)
//! - 输出 sinks：实时渲染与批量有序写出

pub mod error;
pub mod pool;
pub mod sinks;
pub mod transforms;

pub use contracts::{BatchSink, LiveSink, Transform};
pub use error::DispatcherError;
pub use pool::{FailedItem, PoolConfig, PoolReport, WorkerExit, WorkerPool, WorkerReport};
pub use sinks::{FileSink, FrameManifest, LogSink, MemorySink, RecordingLiveSink};
pub use transforms::{build_frame_transform, FrameTransform};
