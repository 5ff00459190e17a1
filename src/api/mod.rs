//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /stats` - Cache statistics
//! - `GET /size` - Entries held
//! - `POST /clear` - Clear models
//! - `POST /purge` - Purge models
//! - `POST /models/:model/:operation` - Call through the cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
