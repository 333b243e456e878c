//! Reassembly 错误类型

use thiserror::Error;

/// 批处理重组表拒绝写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcceptError {
    /// 序号超出 `[0, N)`
    #[error("index {index} out of range for table of {len}")]
    OutOfRange { index: u64, len: u64 },

    /// 该槽已写入
    #[error("index {index} already written")]
    Duplicate { index: u64 },
}
