//! Interception Module
//!
//! The cache instance and the model wrapper that routes reads through it.
//!
//! # Flow
//! - Cacheable operations are keyed, looked up, and loaded on a miss
//! - Invalidating operations clear the model's association closure
//! - Everything else passes through untouched

mod model_cache;
mod wrapper;

pub use model_cache::{CacheSnapshot, ModelCache};
pub use wrapper::{CachedModel, CachedOperation, Classification, Member};
