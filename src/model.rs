//! Model Module
//!
//! The data-access interface the cache sits in front of. A [`Model`] is one
//! entity type with named operations; the cache never looks inside them.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::cache::Arg;

/// Future returned by asynchronous model operations.
pub type ModelFuture = BoxFuture<'static, anyhow::Result<Value>>;

// == Invocation ==
/// What a model operation hands back when invoked.
pub enum Invocation {
    /// A result that resolves later. Cacheable operations must return this.
    Deferred(ModelFuture),
    /// A result available immediately.
    Ready(Value),
}

impl Invocation {
    /// Wraps a future as a deferred invocation.
    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Invocation::Deferred(future.boxed())
    }

    /// Resolves the invocation, awaiting deferred results.
    pub async fn resolve(self) -> anyhow::Result<Value> {
        match self {
            Invocation::Deferred(future) => future.await,
            Invocation::Ready(value) => Ok(value),
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Deferred(_) => f.write_str("Invocation::Deferred"),
            Invocation::Ready(value) => f.debug_tuple("Invocation::Ready").field(value).finish(),
        }
    }
}

// == Model Trait ==
/// One entity type of the data layer.
pub trait Model: Send + Sync {
    /// Name the model is configured and associated under.
    fn name(&self) -> &str;

    /// Every operation this model exposes.
    fn operations(&self) -> Vec<String>;

    /// Runs `operation`. Errors returned here are synchronous failures; async
    /// failures come out of the deferred future.
    fn invoke(&self, operation: &str, args: &[Arg]) -> anyhow::Result<Invocation>;

    /// Declares this model's relations and returns the related model names.
    fn associate(&self) -> Vec<String> {
        Vec::new()
    }
}

// == Operation ==
/// A named operation bound to its model, as the data layer exposes it.
#[derive(Clone)]
pub struct Operation {
    model: Arc<dyn Model>,
    name: String,
}

impl Operation {
    pub fn new(model: Arc<dyn Model>, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Invokes the operation without resolving it.
    pub fn invoke(&self, args: &[Arg]) -> anyhow::Result<Invocation> {
        self.model.invoke(&self.name, args)
    }

    /// Invokes and resolves the operation.
    pub async fn call(&self, args: &[Arg]) -> anyhow::Result<Value> {
        self.invoke(args)?.resolve().await
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation({}.{})", self.model.name(), self.name)
    }
}
