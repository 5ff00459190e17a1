//! Model Cache
//!
//! The cache instance: one entry store per configured model, the association
//! graph, and the stats collector, shared by every wrapped model.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{
    AssociationGraph, CacheStats, Clock, EntryStore, ModelName, Purged, StatsCollector,
    StatsEvent,
};
use crate::config::{CacheConfiguration, CacheOptions, ModelConfig};
use crate::intercept::CachedModel;
use crate::model::Model;
use crate::tasks::spawn_heartbeat_task;

// == Cache Snapshot ==
/// Counters plus current per-model sizes.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub sizes: BTreeMap<String, usize>,
}

struct Shared {
    configs: HashMap<String, Arc<ModelConfig>>,
    stores: HashMap<String, Mutex<EntryStore>>,
    graph: RwLock<AssociationGraph>,
    stats: StatsCollector,
    clock: Arc<dyn Clock>,
    heartbeat_interval_secs: u64,
}

// == Model Cache ==
/// Handle to a cache instance. Clones share the same state.
#[derive(Clone)]
pub struct ModelCache {
    shared: Arc<Shared>,
}

impl ModelCache {
    // == Constructor ==
    /// Creates a cache with one entry store per configured model.
    pub fn new(configuration: CacheConfiguration, options: CacheOptions) -> Self {
        let mut configs = HashMap::new();
        let mut stores = HashMap::new();
        for (name, config) in configuration.iter() {
            configs.insert(name.clone(), Arc::new(config.clone()));
            stores.insert(name.clone(), Mutex::new(EntryStore::new()));
        }

        Self {
            shared: Arc::new(Shared {
                configs,
                stores,
                graph: RwLock::new(AssociationGraph::new()),
                stats: StatsCollector::new(options.verbose, options.delegate),
                clock: options.clock,
                heartbeat_interval_secs: options.heartbeat_interval_secs,
            }),
        }
    }

    // == Wrap ==
    /// Wraps a model so its reads go through this cache.
    pub fn wrap(&self, model: Arc<dyn Model>) -> CachedModel {
        let config = self.shared.configs.get(model.name()).cloned();
        CachedModel::new(self.clone(), model, config)
    }

    /// Settings for `model`, if it is cached.
    pub fn config(&self, model: &str) -> Option<Arc<ModelConfig>> {
        self.shared.configs.get(model).cloned()
    }

    pub fn is_cached(&self, model: &str) -> bool {
        self.shared.stores.contains_key(model)
    }

    /// Configured model names in sorted order.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.configs.keys().cloned().collect();
        names.sort();
        names
    }

    // == Associations ==
    /// Records that `a` and `b` are related, in both directions.
    pub fn register_association(&self, a: &str, b: &str) {
        if self.shared.graph.write().add_edge(a, b) {
            debug!(from = a, to = b, "association registered");
        }
    }

    /// `model` plus every model transitively associated with it.
    pub fn association_closure(&self, model: &str) -> Vec<ModelName> {
        self.shared.graph.read().closure([model])
    }

    // == Invalidate ==
    /// Clears `model` and every model associated with it. Returns the models
    /// that were visited.
    pub fn invalidate(&self, model: &str) -> Vec<ModelName> {
        let closure = self.association_closure(model);
        let mut cleared = 0;
        for name in &closure {
            if let Some(store) = self.shared.stores.get(name.as_str()) {
                cleared += store.lock().clear();
            }
        }
        info!(
            model,
            models = closure.len(),
            entries = cleared,
            "cache invalidated"
        );
        closure
    }

    // == Clear ==
    /// Empties the named stores, or every store when `models` is empty.
    /// Returns the number of entries dropped.
    pub fn clear<I, S>(&self, models: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleared = 0;
        for name in self.select(models) {
            if let Some(store) = self.shared.stores.get(&name) {
                cleared += store.lock().clear();
            }
        }
        info!(entries = cleared, "cache cleared");
        cleared
    }

    // == Size ==
    /// Entries held by the named stores (all stores when empty), stale
    /// entries included.
    pub fn size<I, S>(&self, models: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select(models)
            .iter()
            .filter_map(|name| self.shared.stores.get(name))
            .map(|store| store.lock().len())
            .sum()
    }

    /// Entries held per model.
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.shared
            .stores
            .iter()
            .map(|(name, store)| (name.clone(), store.lock().len()))
            .collect()
    }

    // == Purge All ==
    /// Runs a purge pass over the named stores (all stores when empty).
    /// Returns the number of entries removed.
    pub fn purge_all<I, S>(&self, models: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.now_ms();
        let mut removed = 0;
        for name in self.select(models) {
            let (Some(store), Some(config)) =
                (self.shared.stores.get(&name), self.shared.configs.get(&name))
            else {
                continue;
            };
            let purged = store.lock().purge(config.size_limit, now);
            removed += purged.len();
            self.record_purged(&name, purged);
        }
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheSnapshot {
        let stats = self.shared.stats.snapshot();
        CacheSnapshot {
            hit_rate: stats.hit_rate(),
            stats,
            sizes: self.sizes(),
        }
    }

    /// Reports a heartbeat to the stats delegate regardless of verbosity.
    pub fn heartbeat(&self) {
        self.record(
            StatsEvent::Heartbeat,
            json!({ "interval_secs": self.shared.heartbeat_interval_secs }),
        );
    }

    /// Starts the periodic heartbeat if one is configured. Abort the returned
    /// handle at teardown.
    pub fn start_heartbeat(&self) -> Option<JoinHandle<()>> {
        match self.shared.heartbeat_interval_secs {
            0 => None,
            secs => Some(spawn_heartbeat_task(self.clone(), secs)),
        }
    }

    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.shared.heartbeat_interval_secs
    }

    // == Entry Access ==
    /// Live cached data for `hash` in `model`'s store.
    pub(crate) fn lookup(&self, model: &str, hash: &str) -> Option<Value> {
        let now = self.now_ms();
        self.shared
            .stores
            .get(model)?
            .lock()
            .get(hash, now)
            .map(|entry| entry.data.clone())
    }

    /// Stores a freshly loaded result and purges if the store went over its
    /// limit. Null results are not stored. Returns whether data was stored.
    pub(crate) fn load(&self, model: &str, hash: &str, data: Value) -> bool {
        let (Some(store), Some(config)) =
            (self.shared.stores.get(model), self.shared.configs.get(model))
        else {
            return false;
        };
        let now = self.now_ms();

        let purged = {
            let mut store = store.lock();
            if !store.set(hash.to_string(), data, config.ttl, now) {
                return false;
            }
            if store.len() > config.size_limit {
                store.purge(config.size_limit, now)
            } else {
                Vec::new()
            }
        };

        self.record(StatsEvent::Load, json!({ "model": model, "hash": hash }));
        self.record_purged(model, purged);
        true
    }

    pub(crate) fn record(&self, event: StatsEvent, details: Value) {
        self.shared.stats.record(event, details, || self.sizes());
    }

    fn record_purged(&self, model: &str, purged: Vec<Purged>) {
        for entry in purged {
            debug!(model, hash = %entry.hash, reason = ?entry.reason, "entry purged");
            self.record(
                StatsEvent::Purge,
                json!({ "model": model, "hash": entry.hash, "reason": entry.reason }),
            );
        }
    }

    fn select<I, S>(&self, models: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let named: Vec<String> = models
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        if named.is_empty() {
            self.shared.stores.keys().cloned().collect()
        } else {
            named
        }
    }

    fn now_ms(&self) -> u64 {
        self.shared.clock.now_ms()
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("models", &self.models())
            .field("stats", &self.shared.stats)
            .finish_non_exhaustive()
    }
}
