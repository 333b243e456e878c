//! Camera capture source
//!
//! Two backends behind one `DataSource`:
//! - `Synthetic`: moving gradient test pattern, paced at the configured fps
//! - `Device`: raw RGB24 frames read from a device node (`/dev/video{index}`)
//!
//! A camera running dry is abnormal, so exhaustion is `Fatal`.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    CameraConfig, DataSource, DeviceKind, Exhaustion, Frame, SourceError, SourceId,
};
use tracing::{debug, info};

use crate::frame_io::{read_frame, FrameRead};

/// Capture backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraBackend {
    /// Generated frames; `fail_after` simulates a disconnect after N frames
    Synthetic { fail_after: Option<u64> },
    /// Raw frames from a device node or file
    Device { path: PathBuf },
}

/// Open camera resource
#[derive(Debug)]
pub enum CameraHandle {
    Synthetic { next_due: Instant },
    Device(BufReader<File>),
}

/// Camera source producing `Frame`s of a fixed size.
#[derive(Debug, Clone)]
pub struct CameraCapture {
    id: SourceId,
    index: u32,
    width: u32,
    height: u32,
    frame_interval: Duration,
    backend: CameraBackend,
    frames_read: u64,
}

impl CameraCapture {
    pub fn new(id: impl Into<SourceId>, width: u32, height: u32, fps: u32, backend: CameraBackend) -> Self {
        Self {
            id: id.into(),
            index: 0,
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            backend,
            frames_read: 0,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let backend = match config.device {
            DeviceKind::Synthetic => CameraBackend::Synthetic {
                fail_after: config.fail_after,
            },
            DeviceKind::Device => CameraBackend::Device {
                path: config.resolved_device_path(),
            },
        };
        let mut camera = Self::new("camera", config.width, config.height, config.fps, backend);
        camera.index = config.index;
        camera
    }

    pub fn backend(&self) -> &CameraBackend {
        &self.backend
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn read_synthetic(&mut self, next_due: &mut Instant, fail_after: Option<u64>) -> Result<Frame, SourceError> {
        if fail_after.is_some_and(|n| self.frames_read >= n) {
            return Err(SourceError::read(&self.id, "camera disconnected"));
        }

        let now = Instant::now();
        if *next_due > now {
            thread::sleep(*next_due - now);
        }
        *next_due = (*next_due).max(now) + self.frame_interval;

        Ok(synthetic_pattern(self.width, self.height, self.frames_read))
    }

    fn read_device(&mut self, reader: &mut BufReader<File>) -> Result<Frame, SourceError> {
        let mut buf = vec![0u8; Frame::byte_len(self.width, self.height)];
        match read_frame(reader, &mut buf) {
            Ok(FrameRead::Full) => Frame::new(self.width, self.height, buf)
                .map_err(|e| SourceError::read(&self.id, e.to_string())),
            Ok(FrameRead::Eof) => Err(SourceError::end_of_stream(&self.id)),
            Ok(FrameRead::Partial(n)) => Err(SourceError::read(
                &self.id,
                format!("short frame: {n} of {} bytes", buf.len()),
            )),
            Err(e) => Err(SourceError::read(&self.id, e.to_string())),
        }
    }
}

impl DataSource for CameraCapture {
    type Item = Frame;
    type Handle = CameraHandle;

    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn exhaustion(&self) -> Exhaustion {
        Exhaustion::Fatal
    }

    fn open(&mut self) -> Result<CameraHandle, SourceError> {
        self.frames_read = 0;
        let handle = match &self.backend {
            CameraBackend::Synthetic { .. } => CameraHandle::Synthetic {
                next_due: Instant::now(),
            },
            CameraBackend::Device { path } => {
                let file = File::open(path).map_err(|e| {
                    SourceError::open(&self.id, format!("camera {} ({}): {e}", self.index, path.display()))
                })?;
                CameraHandle::Device(BufReader::new(file))
            }
        };
        info!(
            source_id = %self.id,
            index = self.index,
            width = self.width,
            height = self.height,
            "camera opened"
        );
        Ok(handle)
    }

    fn read_next(&mut self, handle: &mut CameraHandle) -> Result<Frame, SourceError> {
        let frame = match handle {
            CameraHandle::Synthetic { next_due } => {
                let fail_after = match &self.backend {
                    CameraBackend::Synthetic { fail_after } => *fail_after,
                    CameraBackend::Device { .. } => None,
                };
                self.read_synthetic(next_due, fail_after)?
            }
            CameraHandle::Device(reader) => self.read_device(reader)?,
        };
        self.frames_read += 1;
        Ok(frame)
    }

    fn close(&mut self, handle: CameraHandle) {
        drop(handle);
        debug!(source_id = %self.id, frames = self.frames_read, "camera released");
    }
}

/// Diagonal gradient that shifts by one pixel per `phase`.
pub fn synthetic_pattern(width: u32, height: u32, phase: u64) -> Frame {
    let mut data = Vec::with_capacity(Frame::byte_len(width, height));
    let shift = (phase % 256) as u32;
    for y in 0..height {
        for x in 0..width {
            data.push(((x + shift) % 256) as u8);
            data.push(((y + shift) % 256) as u8);
            data.push(shift as u8);
        }
    }
    Frame {
        width,
        height,
        data: Bytes::from(data),
    }
}
