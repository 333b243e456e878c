//! Built-in frame transforms for the batch pool.

use std::sync::Arc;

use contracts::{Frame, Transform, TransformError, TransformKind};
use image::{imageops, DynamicImage, RgbImage};

/// Per-pixel frame transform selected by `TransformKind`
#[derive(Debug, Clone, Copy)]
pub struct FrameTransform {
    kind: TransformKind,
}

impl FrameTransform {
    pub fn new(kind: TransformKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    fn invert(frame: Frame) -> Frame {
        let data: Vec<u8> = frame.data.iter().map(|v| 255 - v).collect();
        Frame {
            width: frame.width,
            height: frame.height,
            data: data.into(),
        }
    }

    fn grayscale(frame: Frame) -> Result<Frame, TransformError> {
        let (width, height) = (frame.width, frame.height);
        let rgb = RgbImage::from_raw(width, height, frame.data.to_vec()).ok_or_else(|| {
            TransformError::new(format!(
                "frame buffer of {} bytes does not match {width}x{height}",
                frame.data.len()
            ))
        })?;

        let gray = DynamicImage::ImageLuma8(imageops::grayscale(&rgb)).to_rgb8();
        Frame::new(width, height, gray.into_raw()).map_err(|e| TransformError::new(e.to_string()))
    }
}

impl Transform<Frame, Frame> for FrameTransform {
    fn apply(&self, frame: Frame) -> Result<Frame, TransformError> {
        match self.kind {
            TransformKind::Identity => Ok(frame),
            TransformKind::Invert => Ok(Self::invert(frame)),
            TransformKind::Grayscale => Self::grayscale(frame),
        }
    }

    fn name(&self) -> &str {
        match self.kind {
            TransformKind::Identity => "identity",
            TransformKind::Invert => "invert",
            TransformKind::Grayscale => "grayscale",
        }
    }
}

/// Shared transform handle for `WorkerPool::start`
pub fn build_frame_transform(kind: TransformKind) -> Arc<dyn Transform<Frame, Frame>> {
    Arc::new(FrameTransform::new(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_passthrough() {
        let frame = Frame::filled(2, 2, [1, 2, 3]);
        let out = build_frame_transform(TransformKind::Identity)
            .apply(frame.clone())
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_invert() {
        let out = FrameTransform::new(TransformKind::Invert)
            .apply(Frame::filled(3, 1, [0, 100, 255]))
            .unwrap();
        assert_eq!(out.pixel(2, 0), Some([255, 155, 0]));
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let out = FrameTransform::new(TransformKind::Grayscale)
            .apply(Frame::filled(4, 3, [200, 10, 60]))
            .unwrap();
        assert_eq!((out.width, out.height), (4, 3));
        let [r, g, b] = out.pixel(1, 1).unwrap();
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_grayscale_rejects_malformed_buffer() {
        let bad = Frame {
            width: 4,
            height: 4,
            data: vec![0u8; 5].into(),
        };
        assert!(FrameTransform::new(TransformKind::Grayscale).apply(bad).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(build_frame_transform(TransformKind::Invert).name(), "invert");
    }
}
