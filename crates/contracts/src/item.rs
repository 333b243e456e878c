//! IndexedItem / Frame - 流水线中流动的数据
//!
//! `IndexedItem` 是唯一的排序键载体；`Frame` 是相机/文件读取器产出的原始帧。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// 带序号的数据项
///
/// `index` 由产生它的 Producer 在读取时分配，从 0 开始单调递增且无空洞。
/// 经过 WorkerPool 后完成顺序可能打乱，下游只依赖 `index` 恢复顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedItem<T> {
    /// 序号 (排序键)
    pub index: u64,

    /// 载荷
    pub value: T,
}

impl<T> IndexedItem<T> {
    pub fn new(index: u64, value: T) -> Self {
        Self { index, value }
    }

    /// 保留序号，替换载荷
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IndexedItem<U> {
        IndexedItem {
            index: self.index,
            value: f(self.value),
        }
    }

    pub fn as_ref(&self) -> IndexedItem<&T> {
        IndexedItem {
            index: self.index,
            value: &self.value,
        }
    }
}

/// 原始 RGB24 帧
///
/// 像素按行紧密排列，每像素 3 字节，`data.len() == width * height * 3`。
/// `Bytes` 使帧在通道、工作线程和重组表之间克隆时零拷贝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// 宽度 (像素)
    pub width: u32,

    /// 高度 (像素)
    pub height: u32,

    /// 像素数据
    pub data: Bytes,
}

impl Frame {
    /// 每像素字节数
    pub const CHANNELS: usize = 3;

    /// 构造帧，校验数据长度
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Result<Self, ContractError> {
        let data = data.into();
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(ContractError::InvalidFrame {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// 纯色帧
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self {
            width,
            height,
            data: Bytes::from(data),
        }
    }

    /// 给定尺寸下一帧的字节数
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    /// 读取 (x, y) 处像素；越界返回 None
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        let px = self.data.get(offset..offset + Self::CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }
}
