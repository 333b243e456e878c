//! SourceFactory - 从 PipelineBlueprint 构建数据源

use contracts::{PipelineBlueprint, SourceError};
use tracing::instrument;

use crate::{CameraCapture, FileFrameReader, SimulatedSensor};

/// 数据源工厂
///
/// 只做构建，不打开任何资源；资源在各自 Producer 线程中打开。
pub struct SourceFactory<'a> {
    blueprint: &'a PipelineBlueprint,
}

impl<'a> SourceFactory<'a> {
    pub fn new(blueprint: &'a PipelineBlueprint) -> Self {
        Self { blueprint }
    }

    /// 实时拓扑的全部模拟传感器，保持配置顺序
    pub fn sensors(&self) -> Vec<SimulatedSensor> {
        self.blueprint
            .live
            .sensors
            .iter()
            .map(SimulatedSensor::from_config)
            .collect()
    }

    /// 实时相机 (未启用时为 None)
    pub fn camera(&self) -> Option<CameraCapture> {
        self.blueprint
            .live
            .camera_enabled
            .then(|| CameraCapture::from_config(&self.blueprint.camera))
    }

    /// 批处理输入帧读取器
    ///
    /// # Errors
    /// 输入文件无法探测时返回 `SourceError::Open`
    #[instrument(name = "source_factory_frame_reader", skip(self))]
    pub fn frame_reader(&self) -> Result<FileFrameReader, SourceError> {
        let camera = &self.blueprint.camera;
        FileFrameReader::probe(
            "reader",
            &self.blueprint.batch.input_path,
            camera.width,
            camera.height,
        )
    }
}
