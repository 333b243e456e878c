//! # Ingestion
//!
//! Bounded channels and the producers that feed them.
//!
//! Responsibilities:
//! - `BoundedChannel<T>`: fixed capacity, `Block` or `DropOldest` overflow
//! - `Producer<S>`: one thread per `DataSource`, assigns sequence indices
//! - Escalation of source exhaustion/failure to the broadcast signals
//!
//! ## Usage Example
//!
//! ```
//! use ingestion::{BoundedChannel, ChannelConfig};
//! use std::time::Duration;
//!
//! let ch = BoundedChannel::new("sensor_1", ChannelConfig::drop_oldest(1)).unwrap();
//! ch.push(1).unwrap();
//! ch.push(2).unwrap();
//! assert_eq!(ch.pop_timeout(Duration::from_millis(10)), Ok(2));
//! ```

mod channel;
mod config;
mod error;
mod producer;

pub use channel::{BoundedChannel, Closable, PopError, PushError, PushOutcome};
pub use config::{ChannelConfig, ChannelMetrics, ChannelStats, OverflowPolicy};
pub use error::{IngestionError, Result};
pub use producer::{Producer, ProducerExit, ProducerHandle, ProducerReport};
