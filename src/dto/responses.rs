//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::intercept::{CacheSnapshot, Classification};

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of results stored after a miss
    pub loads: u64,
    /// Number of entries removed by purges
    pub purges: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Entries currently held per model
    pub sizes: BTreeMap<String, usize>,
}

impl From<CacheSnapshot> for StatsResponse {
    fn from(snapshot: CacheSnapshot) -> Self {
        Self {
            hits: snapshot.stats.hits,
            misses: snapshot.stats.misses,
            loads: snapshot.stats.loads,
            purges: snapshot.stats.purges,
            hit_rate: snapshot.hit_rate,
            sizes: snapshot.sizes,
        }
    }
}

/// Response body for GET /size
#[derive(Debug, Clone, Serialize)]
pub struct SizeResponse {
    /// Models counted; empty means all
    pub models: Vec<String>,
    /// Total entries held
    pub size: usize,
}

/// Response body for POST /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    /// Entries dropped
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cleared {} cached entries", cleared),
            cleared,
        }
    }
}

/// Response body for POST /purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    /// Success message
    pub message: String,
    /// Entries removed
    pub purged: usize,
}

impl PurgeResponse {
    pub fn new(purged: usize) -> Self {
        Self {
            message: format!("Purged {} cached entries", purged),
            purged,
        }
    }
}

/// Response body for POST /models/:model/:operation
#[derive(Debug, Clone, Serialize)]
pub struct InvokeResponse {
    pub model: String,
    pub operation: String,
    /// "cacheable", "invalidating" or "pass_through"
    pub classification: String,
    pub result: Value,
}

impl InvokeResponse {
    pub fn new(
        model: impl Into<String>,
        operation: impl Into<String>,
        classification: Classification,
        result: Value,
    ) -> Self {
        let classification = match classification {
            Classification::Cacheable => "cacheable",
            Classification::Invalidating => "invalidating",
            Classification::PassThrough => "pass_through",
        };
        Self {
            model: model.into(),
            operation: operation.into(),
            classification: classification.to_string(),
            result,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use serde_json::json;

    #[test]
    fn test_stats_response_from_snapshot() {
        let snapshot = CacheSnapshot {
            stats: CacheStats {
                hits: 8,
                misses: 2,
                loads: 2,
                purges: 0,
            },
            hit_rate: 0.8,
            sizes: BTreeMap::from([("User".to_string(), 2)]),
        };
        let resp = StatsResponse::from(snapshot);

        assert_eq!(resp.hits, 8);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.sizes["User"], 2);
    }

    #[test]
    fn test_clear_and_purge_messages() {
        assert!(ClearResponse::new(3).message.contains('3'));
        assert_eq!(PurgeResponse::new(0).purged, 0);
    }

    #[test]
    fn test_invoke_response_serialize() {
        let resp = InvokeResponse::new("User", "find_one", Classification::Cacheable, json!({"id": 1}));
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["classification"], "cacheable");
        assert_eq!(json["result"]["id"], 1);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
