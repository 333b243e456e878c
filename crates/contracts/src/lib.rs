//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate.
//! All business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Ordering Model
//! - `IndexedItem::index` is assigned by the reading producer, starting at 0
//! - It is the only ordering key once items leave their producer

mod blueprint;
mod error;
mod item;
mod signal;
mod sink;
mod source;
mod source_id;
mod transform;

pub use blueprint::*;
pub use error::*;
pub use item::{Frame, IndexedItem};
pub use signal::{FatalCause, Signal, Signals};
pub use sink::*;
pub use source::{DataSource, Exhaustion};
pub use source_id::SourceId;
pub use transform::Transform;
