//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Arg;

/// Request body for `POST /clear` and `POST /purge`
///
/// An empty (or missing) `models` list targets every cached model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsRequest {
    /// Model names to act on
    #[serde(default)]
    pub models: Vec<String>,
}

impl ModelsRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Some("Model names cannot be empty".to_string());
        }
        None
    }
}

/// Query string for `GET /size`, e.g. `?models=User,Post`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeQuery {
    /// Comma separated model names; absent means all
    pub models: Option<String>,
}

impl SizeQuery {
    /// Model names listed in the query.
    pub fn names(&self) -> Vec<String> {
        self.models
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Request body for `POST /models/:model/:operation`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokeRequest {
    /// Positional call arguments
    #[serde(default)]
    pub args: Vec<Value>,
}

impl InvokeRequest {
    /// Arguments converted for the interception layer.
    pub fn to_args(&self) -> Vec<Arg> {
        self.args.iter().cloned().map(Arg::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_request_defaults_to_all() {
        let req: ModelsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.models.is_empty());
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_models_request_rejects_blank_names() {
        let req: ModelsRequest = serde_json::from_str(r#"{"models": ["User", " "]}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_size_query_names() {
        let query = SizeQuery {
            models: Some("User, Post,,".to_string()),
        };
        assert_eq!(query.names(), ["User", "Post"]);
        assert!(SizeQuery::default().names().is_empty());
    }

    #[test]
    fn test_invoke_request_args() {
        let req: InvokeRequest =
            serde_json::from_str(r#"{"args": [{"where": {"id": 1}}, 2]}"#).unwrap();
        let args = req.to_args();

        assert_eq!(args.len(), 2);
        assert_eq!(args[1], Arg::Int(2));
        assert!(args[0].get("where").is_some());
    }
}
