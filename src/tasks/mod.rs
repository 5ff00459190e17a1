//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache.
//!
//! # Tasks
//! - Heartbeat: Reports cache stats to the delegate at a fixed interval

mod heartbeat;

pub use heartbeat::spawn_heartbeat_task;
