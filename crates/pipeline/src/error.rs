//! Pipeline 错误类型

use contracts::{ContractError, FatalCause, SourceError, SourceId, WriteError};
use dispatcher::DispatcherError;
use ingestion::IngestionError;
use thiserror::Error;

/// 一次运行的最终错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 配置非法 (启动前失败)
    #[error(transparent)]
    Config(#[from] ContractError),

    /// 通道或生产者创建失败
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// 工作线程池创建失败
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    /// 数据源探测失败 (如输入文件不存在)
    #[error(transparent)]
    Source(#[from] SourceError),

    /// 收集线程创建失败
    #[error("failed to spawn collector thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// 批处理需要预先知道总数 N
    #[error("source '{source_id}' does not report its length")]
    UnknownLength { source_id: SourceId },

    /// 运行中触发 fatal 信号
    #[error("pipeline aborted: {0}")]
    Fatal(FatalCause),

    /// 重组表存在缺口且不允许部分输出
    #[error("incomplete output: {} of {total} items missing (first: {})", .missing.len(), first_missing(.missing))]
    Incomplete { total: usize, missing: Vec<u64> },

    /// 最终写出失败
    #[error(transparent)]
    Write(#[from] WriteError),

    /// 所有线程已 join 后重组表仍被共享
    #[error("reassembly table still shared after teardown")]
    TableShared,
}

fn first_missing(missing: &[u64]) -> String {
    missing
        .first()
        .map_or_else(|| "-".to_string(), |i| i.to_string())
}

impl PipelineError {
    /// 是否为运行期 fatal (对应非零退出码)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn fatal_cause(&self) -> Option<&FatalCause> {
        match self {
            Self::Fatal(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Pipeline Result 类型别名
pub type Result<T> = std::result::Result<T, PipelineError>;
