//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 通道容量非法
    #[error("channel '{channel}' capacity must be >= 1, got {capacity}")]
    InvalidCapacity {
        /// 通道名
        channel: String,
        /// 请求的容量
        capacity: usize,
    },

    /// 生产者线程创建失败
    #[error("failed to spawn producer thread '{name}': {source}")]
    Spawn {
        /// 线程名
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
