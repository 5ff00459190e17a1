//! Cached model wrapper
//!
//! Classifies each operation of a wrapped model once, at wrap time, and
//! dispatches calls through the cache accordingly.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::{derive_key, hash_key, Arg, StatsEvent};
use crate::config::ModelConfig;
use crate::error::{CacheError, Result};
use crate::intercept::ModelCache;
use crate::model::{Invocation, Model, Operation};

// == Classification ==
/// How the wrapper treats an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Results are served from and stored in the cache.
    Cacheable,
    /// Accessing the operation clears the model's association closure.
    Invalidating,
    /// Forwarded untouched.
    PassThrough,
}

fn classify(config: Option<&ModelConfig>, operation: &str) -> Classification {
    match config {
        Some(config) if config.invalidating_operations.contains(operation) => {
            Classification::Invalidating
        }
        Some(config) if config.cacheable_operations.contains(operation) => {
            Classification::Cacheable
        }
        _ => Classification::PassThrough,
    }
}

// == Cached Model ==
/// A model whose reads go through a [`ModelCache`].
#[derive(Clone)]
pub struct CachedModel {
    cache: ModelCache,
    model: Arc<dyn Model>,
    config: Option<Arc<ModelConfig>>,
    table: Arc<HashMap<String, Classification>>,
}

impl CachedModel {
    pub(crate) fn new(
        cache: ModelCache,
        model: Arc<dyn Model>,
        config: Option<Arc<ModelConfig>>,
    ) -> Self {
        let table = model
            .operations()
            .into_iter()
            .map(|op| {
                let class = classify(config.as_deref(), &op);
                (op, class)
            })
            .collect();

        Self {
            cache,
            model,
            config,
            table: Arc::new(table),
        }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Whether this model has cache settings.
    pub fn is_cached(&self) -> bool {
        self.config.is_some()
    }

    /// Classification of `operation`; unknown names pass through.
    pub fn classification(&self, operation: &str) -> Classification {
        self.table
            .get(operation)
            .copied()
            .unwrap_or(Classification::PassThrough)
    }

    // == Member ==
    /// Resolves `operation` to its intercepted form.
    ///
    /// Accessing an invalidating operation clears this model and every model
    /// associated with it when `clear_on_write` is set, once per access and
    /// whether or not the operation is then called.
    pub fn member(&self, operation: &str) -> Member {
        let original = Operation::new(self.model.clone(), operation);
        match self.classification(operation) {
            Classification::Cacheable => Member::Cached(CachedOperation {
                original,
                cache: self.cache.clone(),
            }),
            Classification::Invalidating => {
                if self.config.as_ref().is_some_and(|c| c.clear_on_write) {
                    self.cache.invalidate(self.name());
                }
                Member::Invalidating(original)
            }
            Classification::PassThrough => Member::PassThrough(original),
        }
    }

    /// Shorthand for `member(operation).call(args)`.
    pub async fn call(&self, operation: &str, args: &[Arg]) -> Result<Value> {
        self.member(operation).call(args).await
    }

    // == Associations ==
    /// Runs the model's relation declarations and registers every related
    /// model with the cache. Returns the related names.
    pub fn associate(&self) -> Vec<String> {
        let related = self.model.associate();
        for other in &related {
            self.cache.register_association(self.name(), other);
        }
        related
    }

    // == Escape Hatches ==
    /// The unwrapped model; calls on it never touch the cache.
    pub fn bypass_cache(&self) -> Arc<dyn Model> {
        self.model.clone()
    }

    /// Clears this model's own entries. Returns the number dropped.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear([self.name()])
    }
}

impl fmt::Debug for CachedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedModel")
            .field("name", &self.name())
            .field("cached", &self.is_cached())
            .finish_non_exhaustive()
    }
}

// == Member ==
/// An operation as handed out by [`CachedModel::member`].
#[derive(Debug, Clone)]
pub enum Member {
    Cached(CachedOperation),
    Invalidating(Operation),
    PassThrough(Operation),
}

impl Member {
    /// The data layer's own operation.
    pub fn original(&self) -> &Operation {
        match self {
            Member::Cached(cached) => &cached.original,
            Member::Invalidating(op) | Member::PassThrough(op) => op,
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Member::Cached(_) => Classification::Cacheable,
            Member::Invalidating(_) => Classification::Invalidating,
            Member::PassThrough(_) => Classification::PassThrough,
        }
    }

    /// Runs the operation. Data-layer failures come back as
    /// [`CacheError::Data`] unchanged.
    pub async fn call(&self, args: &[Arg]) -> Result<Value> {
        match self {
            Member::Cached(cached) => cached.call(args).await,
            Member::Invalidating(op) | Member::PassThrough(op) => Ok(op.call(args).await?),
        }
    }
}

// == Cached Operation ==
/// A cacheable operation. Derefs to the original [`Operation`].
#[derive(Clone)]
pub struct CachedOperation {
    original: Operation,
    cache: ModelCache,
}

impl CachedOperation {
    /// Serves `args` from the cache, or calls through and stores the result.
    ///
    /// Calls carrying an active transaction skip the cache entirely. The
    /// underlying operation must return a deferred result; a ready one is
    /// rejected with [`CacheError::NotDeferred`].
    pub async fn call(&self, args: &[Arg]) -> Result<Value> {
        let model = self.original.model().name();
        let operation = self.original.name();

        if args.iter().any(Arg::carries_active_transaction) {
            debug!(model, operation, "transaction in flight, bypassing cache");
            return Ok(self.original.call(args).await?);
        }

        let key = derive_key(model, operation, args)?;
        let hash = hash_key(&key);
        let details = json!({ "model": model, "operation": operation, "hash": hash });

        if let Some(data) = self.cache.lookup(model, &hash) {
            debug!(model, operation, %hash, "cache hit");
            self.cache.record(StatsEvent::Hit, details);
            return Ok(data);
        }

        debug!(model, operation, %hash, "cache miss");
        self.cache.record(StatsEvent::Miss, details);

        let pending = match self.original.invoke(args)? {
            Invocation::Deferred(pending) => pending,
            Invocation::Ready(_) => {
                warn!(model, operation, "cacheable operation returned a ready result");
                return Err(CacheError::NotDeferred {
                    model: model.to_string(),
                    operation: operation.to_string(),
                });
            }
        };

        let data = pending.await?;
        if self.cache.load(model, &hash, data.clone()) {
            debug!(model, operation, %hash, "result cached");
        }
        Ok(data)
    }
}

impl Deref for CachedOperation {
    type Target = Operation;

    fn deref(&self) -> &Operation {
        &self.original
    }
}

impl fmt::Debug for CachedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachedOperation").field(&self.original).finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfiguration;

    #[test]
    fn test_classify_without_config_passes_through() {
        assert_eq!(classify(None, "find_one"), Classification::PassThrough);
    }

    #[test]
    fn test_classify_with_config() {
        let config = ModelConfig::new();

        assert_eq!(classify(Some(&config), "find_one"), Classification::Cacheable);
        assert_eq!(classify(Some(&config), "update"), Classification::Invalidating);
        assert_eq!(classify(Some(&config), "describe"), Classification::PassThrough);
    }

    #[test]
    fn test_invalidating_wins_over_cacheable() {
        let config = ModelConfig::new()
            .with_cacheable(["find_or_create"])
            .with_invalidating(["find_or_create"]);

        assert_eq!(
            classify(Some(&config), "find_or_create"),
            Classification::Invalidating
        );
    }

    #[test]
    fn test_unknown_member_passes_through() {
        let cache = ModelCache::new(
            CacheConfiguration::new().with_model("User", ModelConfig::new()),
            Default::default(),
        );
        let wrapped = cache.wrap(Arc::new(crate::memory::MemoryModel::new("User")));

        let member = wrapped.member("teleport");

        assert_eq!(member.classification(), Classification::PassThrough);
        assert_eq!(member.original().name(), "teleport");
    }
}
