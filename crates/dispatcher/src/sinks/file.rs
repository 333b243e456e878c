//! FileSink - persists the reassembled frame sequence to disk
//!
//! `Raw`: frames concatenated into `output_path`, plus `<output_path>.json`.
//! `PngSequence`: `output_path` is a directory of `frame_000000.png` files
//! plus `manifest.json`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use contracts::{BatchConfig, BatchSink, Frame, OutputFormat, WriteError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// Sidecar description of a written sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frame_count: usize,
    /// RFC 3339 timestamp
    pub created_at: String,
}

/// Sink that writes the ordered frame sequence to disk
pub struct FileSink {
    name: String,
    path: PathBuf,
    format: OutputFormat,
    fps: u32,
}

impl FileSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format,
            fps: 30,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new("file", &config.output_path, config.output_format).with_fps(config.fps)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the manifest for this sink's output lands
    pub fn manifest_path(&self) -> PathBuf {
        match self.format {
            OutputFormat::Raw => {
                let mut name = OsString::from(self.path.as_os_str());
                name.push(".json");
                PathBuf::from(name)
            }
            OutputFormat::PngSequence => self.path.join("manifest.json"),
        }
    }

    /// All frames must share the first frame's dimensions.
    fn dimensions(&self, frames: &[Frame]) -> Result<(u32, u32), WriteError> {
        let Some(first) = frames.first() else {
            return Ok((0, 0));
        };
        for (i, frame) in frames.iter().enumerate() {
            if (frame.width, frame.height) != (first.width, first.height) {
                return Err(WriteError::new(
                    &self.name,
                    format!(
                        "frame {i} is {}x{}, expected {}x{}",
                        frame.width, frame.height, first.width, first.height
                    ),
                ));
            }
            if frame.data.len() != Frame::byte_len(frame.width, frame.height) {
                return Err(WriteError::new(
                    &self.name,
                    format!("frame {i} carries {} bytes", frame.data.len()),
                ));
            }
        }
        Ok((first.width, first.height))
    }

    fn write_raw(&self, frames: &[Frame]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        for frame in frames {
            writer.write_all(&frame.data)?;
        }
        writer.flush()
    }

    fn write_png_sequence(&self, frames: &[Frame]) -> std::io::Result<()> {
        fs::create_dir_all(&self.path)?;
        for (i, frame) in frames.iter().enumerate() {
            let path = self.path.join(format!("frame_{i:06}.png"));
            image::save_buffer(
                path,
                &frame.data,
                frame.width,
                frame.height,
                image::ColorType::Rgb8,
            )
            .map_err(std::io::Error::other)?;
        }
        Ok(())
    }

    fn write_manifest(&self, manifest: &FrameManifest) -> std::io::Result<()> {
        let file = File::create(self.manifest_path())?;
        serde_json::to_writer_pretty(file, manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn persist(&self, frames: &[Frame], width: u32, height: u32) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Raw => self.write_raw(frames)?,
            OutputFormat::PngSequence => self.write_png_sequence(frames)?,
        }

        let manifest = FrameManifest {
            format: self.format,
            width,
            height,
            fps: self.fps,
            frame_count: frames.len(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.write_manifest(&manifest)?;
        debug!(sink = %self.name, manifest = %self.manifest_path().display(), "manifest written");
        Ok(())
    }
}

impl BatchSink<Frame> for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, items),
        fields(sink = %self.name, path = %self.path.display(), frames = items.len())
    )]
    fn write_ordered(&mut self, items: &[Frame]) -> Result<(), WriteError> {
        let (width, height) = self.dimensions(items)?;

        self.persist(items, width, height).map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            WriteError::new(&self.name, e.to_string())
        })?;

        info!(sink = %self.name, frames = items.len(), format = ?self.format, "sequence written");
        Ok(())
    }
}
