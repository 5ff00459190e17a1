//! Cache Statistics Module
//!
//! Counts hit, miss, load and purge events and reports them to a delegate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

// == Stats Event ==
/// Kinds of events the collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsEvent {
    Hit,
    Miss,
    Load,
    Purge,
    /// Periodic report; reported regardless of verbosity and counts nothing.
    Heartbeat,
}

impl fmt::Display for StatsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatsEvent::Hit => "hit",
            StatsEvent::Miss => "miss",
            StatsEvent::Load => "load",
            StatsEvent::Purge => "purge",
            StatsEvent::Heartbeat => "heartbeat",
        };
        f.write_str(name)
    }
}

// == Cache Stats ==
/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to reach the data layer
    pub misses: u64,
    /// Results stored after a miss
    pub loads: u64,
    /// Entries removed by purge passes
    pub purges: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Report ==
/// What the delegate receives for each reported event.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub event: StatsEvent,
    pub stats: CacheStats,
    pub hit_rate: f64,
    /// Entries currently held per model
    pub sizes: BTreeMap<String, usize>,
    /// Event specific context supplied by the caller
    pub details: Value,
}

/// Receiver of stats reports.
pub type StatsDelegate = Arc<dyn Fn(&StatsReport) + Send + Sync>;

/// Delegate that logs every report as a structured `tracing` event.
pub fn log_delegate() -> StatsDelegate {
    Arc::new(|report: &StatsReport| {
        tracing::info!(
            target: "model_cache::stats",
            event = %report.event,
            hits = report.stats.hits,
            misses = report.stats.misses,
            loads = report.stats.loads,
            purges = report.stats.purges,
            hit_rate = report.hit_rate,
            sizes = ?report.sizes,
            details = %report.details,
            "cache stats"
        );
    })
}

// == Stats Collector ==
/// Process-wide event counters with delegate reporting.
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    purges: AtomicU64,
    verbose: bool,
    delegate: StatsDelegate,
}

impl StatsCollector {
    // == Constructor ==
    pub fn new(verbose: bool, delegate: StatsDelegate) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            purges: AtomicU64::new(0),
            verbose,
            delegate,
        }
    }

    // == Record ==
    /// Counts `event` and reports it if verbose (heartbeats always report).
    ///
    /// `sizes` is only evaluated when a report is emitted.
    pub fn record<F>(&self, event: StatsEvent, details: Value, sizes: F)
    where
        F: FnOnce() -> BTreeMap<String, usize>,
    {
        let counter = match event {
            StatsEvent::Hit => Some(&self.hits),
            StatsEvent::Miss => Some(&self.misses),
            StatsEvent::Load => Some(&self.loads),
            StatsEvent::Purge => Some(&self.purges),
            StatsEvent::Heartbeat => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if self.verbose || event == StatsEvent::Heartbeat {
            let stats = self.snapshot();
            let report = StatsReport {
                event,
                hit_rate: stats.hit_rate(),
                stats,
                sizes: sizes(),
                details,
            };
            (self.delegate)(&report);
        }
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

impl fmt::Debug for StatsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsCollector")
            .field("stats", &self.snapshot())
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}
