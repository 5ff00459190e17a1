//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::dto::{
    ClearResponse, HealthResponse, InvokeRequest, InvokeResponse, ModelsRequest, PurgeResponse,
    SizeQuery, SizeResponse, StatsResponse,
};
use crate::error::{CacheError, Result};
use crate::intercept::{CachedModel, ModelCache};
use crate::model::Model;

/// Application state shared across all handlers.
///
/// Holds the cache instance and the wrapped models reachable over HTTP.
#[derive(Clone)]
pub struct AppState {
    /// The cache instance
    pub cache: ModelCache,
    /// Wrapped models by name
    pub models: Arc<HashMap<String, CachedModel>>,
}

impl AppState {
    /// Creates a new AppState with no models exposed.
    pub fn new(cache: ModelCache) -> Self {
        Self {
            cache,
            models: Arc::new(HashMap::new()),
        }
    }

    /// Wraps `models` with `cache`, runs their association hooks, and exposes
    /// them by name.
    pub fn with_models(cache: ModelCache, models: Vec<Arc<dyn Model>>) -> Self {
        let wrapped: HashMap<String, CachedModel> = models
            .into_iter()
            .map(|model| {
                let cached = cache.wrap(model);
                (cached.name().to_string(), cached)
            })
            .collect();
        for model in wrapped.values() {
            model.associate();
        }

        Self {
            cache,
            models: Arc::new(wrapped),
        }
    }
}

/// Handler for GET /stats
///
/// Returns counters, hit rate and per-model sizes.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /size
///
/// Counts entries held by the listed models, or by all of them.
pub async fn size_handler(
    State(state): State<AppState>,
    Query(query): Query<SizeQuery>,
) -> Json<SizeResponse> {
    let models = query.names();
    let size = state.cache.size(&models);

    Json(SizeResponse { models, size })
}

/// Handler for POST /clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Json(req): Json<ModelsRequest>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cleared = state.cache.clear(&req.models);
    Ok(Json(ClearResponse::new(cleared)))
}

/// Handler for POST /purge
pub async fn purge_handler(
    State(state): State<AppState>,
    Json(req): Json<ModelsRequest>,
) -> Result<Json<PurgeResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let purged = state.cache.purge_all(&req.models);
    Ok(Json(PurgeResponse::new(purged)))
}

/// Handler for POST /models/:model/:operation
///
/// Calls a model operation through the interception layer.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Path((model, operation)): Path<(String, String)>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>> {
    let wrapped = state
        .models
        .get(&model)
        .ok_or_else(|| CacheError::UnknownModel(model.clone()))?;

    let member = wrapped.member(&operation);
    let result = member.call(&req.to_args()).await?;

    Ok(Json(InvokeResponse::new(
        model,
        operation,
        member.classification(),
        result,
    )))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
