//! Model Cache - A transparent in-memory read cache for model-based data layers
//!
//! Serves read operations from per-model TTL stores, loads them on a miss, and
//! clears related models when a write is made.

pub mod api;
pub mod cache;
pub mod config;
pub mod dto;
pub mod error;
pub mod intercept;
pub mod memory;
pub mod model;
pub mod tasks;

pub use api::AppState;
pub use config::{CacheConfiguration, CacheOptions, Config, ModelConfig};
pub use error::{CacheError, Result};
pub use intercept::{CachedModel, Member, ModelCache};
pub use model::{Invocation, Model, Operation};
pub use tasks::spawn_heartbeat_task;
