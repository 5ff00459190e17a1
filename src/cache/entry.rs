//! Cache Entry Module
//!
//! Defines individual cache entries, their TTL semantics and the clock they are
//! measured against.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

// == Ttl ==
/// Time-to-live applied to entries of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Entries never expire by time; only clears and size eviction remove them.
    Never,
    /// Entries expire this many milliseconds after insertion.
    Millis(u64),
}

impl Ttl {
    /// A TTL of whole seconds.
    pub const fn seconds(secs: u64) -> Self {
        Ttl::Millis(secs.saturating_mul(1000))
    }

    /// Maps a configured TTL onto the cache semantics.
    ///
    /// Positive values expire after that many seconds. Zero and negative values
    /// mean the entry never expires.
    pub fn from_secs(secs: i64) -> Self {
        if secs > 0 {
            Ttl::seconds(secs as u64)
        } else {
            Ttl::Never
        }
    }

    /// Like [`Ttl::from_secs`] for fractional seconds, rounded to the nearest
    /// millisecond. Non-finite values mean never.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Ttl::Millis((secs * 1000.0).round() as u64)
        } else {
            Ttl::Never
        }
    }

    /// Computes the absolute expiry for an entry inserted at `now_ms`.
    pub fn expires_at(&self, now_ms: u64) -> Option<u64> {
        match self {
            Ttl::Never => None,
            Ttl::Millis(ms) => Some(now_ms.saturating_add(*ms)),
        }
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::seconds(3600)
    }
}

// == Clock ==
/// Source of "now" for expiry decisions, in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a manual clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Cache Entry ==
/// A cached operation result with its expiry.
#[derive(Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached result
    pub data: Value,
    /// Insertion timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry inserted at `now_ms` with the given TTL.
    pub fn new(data: Value, ttl: Ttl, now_ms: u64) -> Self {
        Self {
            data,
            created_at: now_ms,
            expires_at: ttl.expires_at(now_ms),
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` reaches its expiry. Entries without an
    /// expiry never expire.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    /// Returns true if the entry may be served at `now_ms`.
    pub fn is_live(&self, now_ms: u64) -> bool {
        !self.is_expired(now_ms)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms))
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ttl_from_secs() {
        assert_eq!(Ttl::from_secs(5), Ttl::Millis(5_000));
        assert_eq!(Ttl::from_secs(0), Ttl::Never);
        assert_eq!(Ttl::from_secs(-10), Ttl::Never);
    }

    #[test]
    fn test_ttl_from_fractional_secs() {
        assert_eq!(Ttl::from_secs_f64(1.5), Ttl::Millis(1_500));
        assert_eq!(Ttl::from_secs_f64(0.0004), Ttl::Millis(0));
        assert_eq!(Ttl::from_secs_f64(0.0), Ttl::Never);
        assert_eq!(Ttl::from_secs_f64(-2.5), Ttl::Never);
        assert_eq!(Ttl::from_secs_f64(f64::NAN), Ttl::Never);

        let entry = CacheEntry::new(json!(1), Ttl::from_secs_f64(1.5), 0);
        assert!(entry.is_live(1_499));
        assert!(entry.is_expired(1_500));
    }

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(json!({"id": 1}), Ttl::Never, 1_000);

        assert_eq!(entry.data, json!({"id": 1}));
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired(u64::MAX));
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(json!("row"), Ttl::seconds(60), 1_000);

        assert_eq!(entry.expires_at, Some(61_000));
        assert!(entry.is_live(60_999));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(json!(1), Ttl::seconds(1), 5_000);

        assert!(entry.is_live(5_999));
        assert!(entry.is_expired(6_000), "Entry should be expired at boundary");
    }

    #[test]
    fn test_ttl_remaining_ms() {
        let entry = CacheEntry::new(json!(1), Ttl::seconds(10), 0);

        assert_eq!(entry.ttl_remaining_ms(4_000), Some(6_000));
        assert_eq!(entry.ttl_remaining_ms(20_000), Some(0));
        assert!(CacheEntry::new(json!(1), Ttl::Never, 0)
            .ttl_remaining_ms(0)
            .is_none());
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(100);
        let other = clock.clone();

        clock.advance_secs(2);
        other.advance_ms(5);

        assert_eq!(clock.now_ms(), 2_105);
        assert_eq!(other.now_ms(), 2_105);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
