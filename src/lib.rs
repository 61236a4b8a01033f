//! Thread Cache - bounded, two-tier async cache for message threads
//!
//! Hides the latency of a remote message API behind time-bounded,
//! single-flight cells held in a fixed-capacity LRU map.

pub mod cache;
pub mod config;
pub mod error;
pub mod thread;

pub use cache::{BoundedKeyedCache, CacheStats, TtlCell, TtlCellBuilder};
pub use config::{CellConfig, Config};
pub use error::{CacheError, Result};
pub use thread::{EntryState, MessageParser, ThreadSource, TieredThreadCache};
