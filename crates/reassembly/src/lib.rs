//! # Reassembly
//!
//! 恢复被并行处理打乱的数据顺序。
//!
//! 两种变体，接口形状相同 (`accept(IndexedItem<T>)`)：
//! - 实时：`LatestSlot` / `LiveReassembler`，每通道只保留最新值，后写者胜
//! - 批处理：`ReassemblyTable`，按序号预分配、每槽只写一次，完整后顺序遍历
//!
//! ## 使用示例
//!
//! ```
//! use contracts::IndexedItem;
//! use reassembly::{ReassemblyOutcome, ReassemblyTable};
//!
//! let table = ReassemblyTable::new(3);
//! for index in [2u64, 0, 1] {
//!     table.accept(IndexedItem::new(index, index * 10)).unwrap();
//! }
//! assert!(table.is_complete());
//! assert_eq!(table.into_outcome(), ReassemblyOutcome::Complete(vec![0, 10, 20]));
//! ```

mod collector;
mod error;
mod live;
mod slot;
mod table;

pub use collector::{BatchCollector, CollectorExit, CollectorHandle, CollectorReport};
pub use error::AcceptError;
pub use live::{CollectSummary, LiveReassembler};
pub use slot::LatestSlot;
pub use table::{ReassemblyOutcome, ReassemblyTable};
