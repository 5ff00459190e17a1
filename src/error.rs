//! Error types for the model cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::dto::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the model cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A cacheable operation returned a ready value instead of a deferred one
    #[error("Operation {model}.{operation} is cacheable but did not return a deferred result")]
    NotDeferred { model: String, operation: String },

    /// Call arguments could not be rendered into a stable key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Failure raised by the underlying data layer, passed through unchanged
    #[error(transparent)]
    Data(#[from] anyhow::Error),

    /// No model with this name is known
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotDeferred { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::KeyDerivation(_) => StatusCode::BAD_REQUEST,
            CacheError::Data(_) => StatusCode::BAD_GATEWAY,
            CacheError::UnknownModel(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the model cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_transparent() {
        let error = CacheError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(error.to_string(), "connection reset");
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                CacheError::NotDeferred {
                    model: "User".to_string(),
                    operation: "find_one".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CacheError::KeyDerivation("nan".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::Data(anyhow::anyhow!("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::UnknownModel("Ghost".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                CacheError::InvalidRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(
                response.status(),
                expected_status,
                "Error should map to correct HTTP status"
            );
        }
    }
}
