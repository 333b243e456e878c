//! # Sources
//!
//! Concrete `DataSource` implementations and their factory.
//!
//! | source            | item    | exhaustion |
//! |-------------------|---------|------------|
//! | `SimulatedSensor` | `u64`   | quiet      |
//! | `CameraCapture`   | `Frame` | fatal      |
//! | `FileFrameReader` | `Frame` | graceful   |
//! | `IterSource<T>`   | `T`     | graceful   |

mod camera;
mod factory;
mod file_reader;
mod frame_io;
mod iter_source;
mod sensor;

pub use camera::{synthetic_pattern, CameraBackend, CameraCapture, CameraHandle};
pub use contracts::{DataSource, Exhaustion};
pub use factory::SourceFactory;
pub use file_reader::FileFrameReader;
pub use iter_source::IterSource;
pub use sensor::SimulatedSensor;
