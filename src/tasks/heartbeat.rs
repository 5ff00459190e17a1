//! Heartbeat Task
//!
//! Background task that periodically reports cache stats to the delegate,
//! regardless of verbosity.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::intercept::ModelCache;

/// Spawns a background task that reports a heartbeat every interval.
///
/// The first report is made one full interval after spawning. The task runs
/// until aborted.
///
/// # Arguments
/// * `cache` - The cache instance to report on
/// * `interval_secs` - Seconds between heartbeats (values below 1 are raised to 1)
///
/// # Returns
/// A JoinHandle for the spawned task. Abort it at teardown so the timer does
/// not outlive the cache.
///
/// # Example
/// ```ignore
/// let handle = spawn_heartbeat_task(cache.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_heartbeat_task(cache: ModelCache, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting cache heartbeat with interval of {} seconds", period.as_secs());

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            cache.heartbeat();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::cache::{StatsDelegate, StatsEvent, StatsReport};
    use crate::config::{CacheConfiguration, CacheOptions, ModelConfig};

    fn counting_cache(interval: u64) -> (ModelCache, Arc<Mutex<Vec<StatsEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let delegate: StatsDelegate =
            Arc::new(move |report: &StatsReport| sink.lock().push(report.event));
        let cache = ModelCache::new(
            CacheConfiguration::new().with_model("User", ModelConfig::new()),
            CacheOptions::new()
                .with_delegate(delegate)
                .with_heartbeat_interval(interval),
        );
        (cache, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_reports_every_interval() {
        let (cache, seen) = counting_cache(10);

        let handle = spawn_heartbeat_task(cache, 10);

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.abort();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|e| *e == StatsEvent::Heartbeat));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_heartbeat_uses_configured_interval() {
        let (cache, seen) = counting_cache(5);

        let handle = cache.start_heartbeat().expect("heartbeat configured");
        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.abort();

        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_task_can_be_aborted() {
        let (cache, _) = counting_cache(1);

        let handle = spawn_heartbeat_task(cache, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
