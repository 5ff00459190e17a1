//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invoke_handler, purge_handler, size_handler, stats_handler,
    AppState,
};

/// Creates the admin router with all endpoints configured.
///
/// # Endpoints
/// - `GET /stats` - Counters, hit rate and per-model sizes
/// - `GET /size` - Entries held, optionally `?models=A,B`
/// - `POST /clear` - Clear models (`{"models": [...]}`, empty = all)
/// - `POST /purge` - Purge models (`{"models": [...]}`, empty = all)
/// - `POST /models/:model/:operation` - Call an operation through the cache
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/stats", get(stats_handler))
        .route("/size", get(size_handler))
        .route("/clear", post(clear_handler))
        .route("/purge", post(purge_handler))
        .route("/models/:model/:operation", post(invoke_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
