//! Cache Module
//!
//! Building blocks of the model cache: key derivation, per-model entry stores
//! with TTL and purge, the association graph and the stats collector.

mod entry;
mod graph;
mod key;
mod order;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, Clock, ManualClock, SystemClock, Ttl};
pub use graph::{AssociationGraph, ModelName};
pub use key::{derive_key, hash_key, Arg, FnRef, MapKey, Transaction};
pub use order::InsertionOrder;
pub use stats::{log_delegate, CacheStats, StatsCollector, StatsDelegate, StatsEvent, StatsReport};
pub use store::{EntryStore, PurgeReason, Purged};

// == Public Constants ==
/// Default TTL in seconds for models configured without one
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Default per-model entry limit
pub const DEFAULT_SIZE_LIMIT: usize = 50;
