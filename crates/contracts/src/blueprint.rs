//! PipelineBlueprint - Config Loader 输出
//!
//! 描述一次运行的完整配置：相机、实时拓扑、批处理拓扑、运行时参数。
//! 所有字段都有默认值，空配置即可得到可运行的实时/批处理流水线。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的流水线配置蓝图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineBlueprint {
    /// 配置版本
    pub version: ConfigVersion,

    /// 相机设置 (实时相机通道与批处理帧尺寸共用)
    #[validate(nested)]
    pub camera: CameraConfig,

    /// 实时拓扑
    #[validate(nested)]
    pub live: LiveConfig,

    /// 批处理拓扑
    #[validate(nested)]
    pub batch: BatchConfig,

    /// 超时/轮询参数
    #[validate(nested)]
    pub runtime: RuntimeConfig,
}

// ============================================================================
// Camera
// ============================================================================

/// 相机配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CameraConfig {
    /// 相机索引 (设备路径 /dev/video{index})
    pub index: u32,

    /// 帧宽度
    #[validate(range(min = 1, max = 16384))]
    pub width: u32,

    /// 帧高度
    #[validate(range(min = 1, max = 16384))]
    pub height: u32,

    /// 采集帧率
    #[validate(range(min = 1, max = 240))]
    pub fps: u32,

    /// 采集后端
    pub device: DeviceKind,

    /// 显式设备路径 (覆盖 index 推导的路径)
    pub device_path: Option<PathBuf>,

    /// 仅 synthetic：采集 N 帧后模拟断开
    pub fail_after: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 720,
            height: 480,
            fps: 30,
            device: DeviceKind::Synthetic,
            device_path: None,
            fail_after: None,
        }
    }
}

impl CameraConfig {
    /// 实际打开的设备路径
    pub fn resolved_device_path(&self) -> PathBuf {
        self.device_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/dev/video{}", self.index)))
    }

    /// 单帧字节数
    pub fn frame_bytes(&self) -> usize {
        crate::Frame::byte_len(self.width, self.height)
    }
}

/// 相机后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// 生成测试图案
    #[default]
    Synthetic,
    /// 从设备节点读取原始 RGB24 帧
    Device,
}

// ============================================================================
// Live
// ============================================================================

/// 实时拓扑配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LiveConfig {
    /// 渲染帧率 (ticks/sec)
    #[validate(range(min = 1, max = 1000))]
    pub target_fps: u32,

    /// 传感器列表
    #[validate(length(min = 1, max = 64))]
    #[validate(nested)]
    pub sensors: Vec<SensorConfig>,

    /// 每个传感器通道容量
    #[validate(range(min = 1, max = 4096))]
    pub sensor_queue_capacity: usize,

    /// 相机通道容量
    #[validate(range(min = 1, max = 4096))]
    pub camera_queue_capacity: usize,

    /// 传感器通道溢出策略
    pub sensor_overflow: OverflowPolicy,

    /// 相机通道溢出策略，独立于传感器 (默认 drop_oldest)
    pub camera_overflow: OverflowPolicy,

    /// 是否启动相机通道
    pub camera_enabled: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            sensors: SensorConfig::default_set(),
            sensor_queue_capacity: 1,
            camera_queue_capacity: 1,
            sensor_overflow: OverflowPolicy::DropOldest,
            camera_overflow: OverflowPolicy::DropOldest,
            camera_enabled: true,
        }
    }
}

impl LiveConfig {
    /// 渲染间隔
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

/// 模拟传感器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    /// 传感器 ID
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// 每次读取前的延迟 (毫秒)
    #[validate(range(max = 60000))]
    pub delay_ms: u64,

    /// 产出 N 个值后结束 (None 表示无限)
    #[serde(default)]
    pub limit: Option<u64>,
}

impl SensorConfig {
    pub fn new(id: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            id: id.into(),
            delay_ms,
            limit: None,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// 三个速率各异的传感器：10ms / 100ms / 1s
    pub fn default_set() -> Vec<Self> {
        vec![
            Self::new("sensor_1", 10),
            Self::new("sensor_2", 100),
            Self::new("sensor_3", 1000),
        ]
    }
}

/// 通道溢出策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 满时阻塞推送方，直到有空位或通道关闭
    #[default]
    Block,
    /// 满时丢弃最旧元素再插入
    DropOldest,
}

// ============================================================================
// Batch
// ============================================================================

/// 批处理拓扑配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BatchConfig {
    /// 输入原始帧文件
    pub input_path: PathBuf,

    /// 输出路径 (raw 文件或 PNG 目录)
    pub output_path: PathBuf,

    /// 输出格式
    pub output_format: OutputFormat,

    /// 写入清单的帧率
    #[validate(range(min = 1, max = 240))]
    pub fps: u32,

    /// 工作线程数
    #[validate(range(min = 1, max = 256))]
    pub workers: usize,

    /// 输入通道容量 (block 策略)，环形缓冲按容量一次性分配
    #[validate(range(min = 1, max = 1_000_000))]
    pub input_queue_capacity: usize,

    /// 结果通道容量 (block 策略)
    #[validate(range(min = 1, max = 1_000_000))]
    pub result_queue_capacity: usize,

    /// 帧变换
    pub transform: TransformKind,

    /// 单项变换失败的处理策略
    pub failure_policy: FailurePolicy,

    /// 存在缺失时是否仍写出已有部分
    pub allow_partial: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input.rgb"),
            output_path: PathBuf::from("output.rgb"),
            output_format: OutputFormat::Raw,
            fps: 30,
            workers: 4,
            input_queue_capacity: 1000,
            result_queue_capacity: 1000,
            transform: TransformKind::Identity,
            failure_policy: FailurePolicy::Skip,
            allow_partial: false,
        }
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 原始帧顺序拼接 + JSON 清单
    #[default]
    Raw,
    /// 每帧一张 PNG
    PngSequence,
}

/// 内置帧变换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    Identity,
    Invert,
    Grayscale,
}

/// 单项变换失败的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 记录日志并跳过，重组表留下空洞
    #[default]
    Skip,
    /// 同一工作线程内重试，用尽后按 Skip 处理
    Retry { max_attempts: u32 },
    /// 首次失败即触发 fatal
    FailBatch,
}

// ============================================================================
// Runtime
// ============================================================================

/// 运行时参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 工作线程/收集线程的 pop 超时，也是最坏情况下的停机延迟
    #[validate(range(min = 1, max = 60000))]
    pub pop_timeout_ms: u64,

    /// 批处理驱动等待循环的轮询间隔
    #[validate(range(min = 1, max = 10000))]
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pop_timeout_ms: 1000,
            poll_interval_ms: 50,
        }
    }
}

impl RuntimeConfig {
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let bp = PipelineBlueprint::default();
        assert!(bp.validate().is_ok());
        assert_eq!(bp.live.sensors.len(), 3);
        assert_eq!(bp.camera.frame_bytes(), 720 * 480 * 3);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut bp = PipelineBlueprint::default();
        bp.batch.workers = 0;
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_failure_policy_serde() {
        let p: FailurePolicy =
            serde_json::from_str(r#"{"mode":"retry","max_attempts":3}"#).unwrap();
        assert_eq!(p, FailurePolicy::Retry { max_attempts: 3 });

        let p: FailurePolicy = serde_json::from_str(r#"{"mode":"fail_batch"}"#).unwrap();
        assert_eq!(p, FailurePolicy::FailBatch);
    }

    #[test]
    fn test_tick_interval() {
        let live = LiveConfig {
            target_fps: 50,
            ..Default::default()
        };
        assert_eq!(live.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_device_path_from_index() {
        let cam = CameraConfig {
            index: 2,
            ..Default::default()
        };
        assert_eq!(cam.resolved_device_path(), PathBuf::from("/dev/video2"));
    }
}
