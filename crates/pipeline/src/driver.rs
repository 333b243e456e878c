//! PipelineDriver - 按配置蓝图组装实时/批处理拓扑

use std::fmt;
use std::time::Duration;

use contracts::{BatchSink, Frame, LiveSink, PipelineBlueprint, Signals};
use dispatcher::build_frame_transform;
use sources::SourceFactory;
use tracing::info;

use crate::batch::{BatchPipeline, BatchSettings};
use crate::error::Result;
use crate::live::{LivePipeline, LiveSettings};
use crate::stats::{BatchReport, LiveReport};

/// 拓扑类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// 传感器 + 相机实时渲染
    Live,
    /// 读取器 → 线程池 → 重组 → 有序写出
    Batch,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// 实时运行的附加限制
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveLimits {
    pub max_ticks: Option<u64>,
    pub max_duration: Option<Duration>,
}

/// 流水线驱动
///
/// 持有配置与信号；每次 `run_*` 构建一组全新的通道与线程。
pub struct PipelineDriver {
    blueprint: PipelineBlueprint,
    signals: Signals,
}

impl PipelineDriver {
    pub fn new(blueprint: PipelineBlueprint, signals: Signals) -> Self {
        Self { blueprint, signals }
    }

    pub fn blueprint(&self) -> &PipelineBlueprint {
        &self.blueprint
    }

    /// 外部停止 (Ctrl+C 处理器持有此克隆)
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// 组装实时拓扑：每个传感器与相机各一个 drop-oldest 通道
    ///
    /// # Errors
    /// 通道创建或生产者启动失败；运行期 fatal。
    pub fn run_live(&self, sink: &mut dyn LiveSink, limits: LiveLimits) -> Result<LiveReport> {
        let factory = SourceFactory::new(&self.blueprint);
        let settings = LiveSettings::from_config(&self.blueprint.live)
            .with_max_ticks(limits.max_ticks)
            .with_max_duration(limits.max_duration);

        let mut pipeline = LivePipeline::new(settings, self.signals.clone());
        for sensor in factory.sensors() {
            pipeline.add_sensor(sensor)?;
        }
        if let Some(camera) = factory.camera() {
            pipeline.set_camera(camera)?;
        }

        info!(topology = %Topology::Live, "pipeline assembled");
        pipeline.run(sink)
    }

    /// 组装批处理拓扑：文件读取器 → 帧变换线程池 → 有序写出
    ///
    /// # Errors
    /// 输入探测失败、线程创建失败、运行期 fatal、输出不完整或写出失败。
    pub fn run_batch(&self, sink: &mut dyn BatchSink<Frame>) -> Result<BatchReport> {
        let reader = SourceFactory::new(&self.blueprint).frame_reader()?;
        let settings = BatchSettings::from_config(&self.blueprint.batch, &self.blueprint.runtime);
        let transform = build_frame_transform(self.blueprint.batch.transform);

        info!(
            topology = %Topology::Batch,
            input = %self.blueprint.batch.input_path.display(),
            frames = reader.frame_count(),
            "pipeline assembled"
        );
        BatchPipeline::new(settings, self.signals.clone()).run(reader, transform, sink)
    }
}
