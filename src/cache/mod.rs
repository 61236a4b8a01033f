//! Cache Module
//!
//! Provides the time-bounded single-flight cell and the fixed-capacity LRU map
//! that owns cells.

mod freshness;
mod lru;
mod stats;
mod store;
mod truthy;
mod ttl_cell;


// Re-export public types
pub use freshness::{evaluate, Expiry, Freshness};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::BoundedKeyedCache;
pub use truthy::Truthy;
pub use ttl_cell::{FetchFuture, TtlCell, TtlCellBuilder};

// == Public Constants ==
/// Default number of threads kept by the tiered cache
pub const DEFAULT_CAPACITY: usize = 100;
