//! Entry Store Module
//!
//! Per-model storage of cached results keyed by call hash, with TTL lookup
//! semantics and the purge (eviction) pass.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheEntry, InsertionOrder, Ttl};

// == Purge Reason ==
/// Why an entry was removed by a purge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeReason {
    /// The entry's TTL had elapsed.
    Expired,
    /// The store was over its limit and this entry expired soonest.
    OverLimit,
    /// The store was over its limit and held only never-expiring entries; this
    /// was the oldest insertion.
    OverLimitNeverExpiring,
}

/// One entry removed by [`EntryStore::purge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purged {
    pub hash: String,
    pub reason: PurgeReason,
}

// == Entry Store ==
/// Storage for one model's cached results.
#[derive(Debug, Default)]
pub struct EntryStore {
    /// Hash to entry storage
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first
    order: InsertionOrder,
}

impl EntryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
        }
    }

    // == Get ==
    /// Returns the entry for `hash` if it is live at `now_ms`.
    ///
    /// Stale entries are reported as absent but stay in place until they are
    /// overwritten or purged.
    pub fn get(&self, hash: &str, now_ms: u64) -> Option<&CacheEntry> {
        self.entries
            .get(hash)
            .filter(|entry| entry.is_live(now_ms))
    }

    /// Returns the entry for `hash` regardless of expiry.
    pub fn peek(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    // == Set ==
    /// Stores `data` under `hash`, replacing any previous entry.
    ///
    /// `Value::Null` is never stored so that "no row" results are not pinned in
    /// the cache. Returns whether the value was stored.
    pub fn set(&mut self, hash: String, data: Value, ttl: Ttl, now_ms: u64) -> bool {
        if data.is_null() {
            return false;
        }

        self.order.record(&hash);
        self.entries.insert(hash, CacheEntry::new(data, ttl, now_ms));
        true
    }

    // == Delete ==
    /// Removes the entry for `hash`. Returns whether an entry was present.
    pub fn delete(&mut self, hash: &str) -> bool {
        if self.entries.remove(hash).is_some() {
            self.order.remove(hash);
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }

    // == Length ==
    /// Number of entries physically present, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries from oldest to newest insertion.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.order
            .iter()
            .filter_map(move |hash| self.entries.get_key_value(hash))
    }

    // == Purge ==
    /// Drops expired entries, then at most one live entry if still over `limit`.
    ///
    /// A single scan in insertion order removes every expired entry and tracks
    /// the live entry with the earliest expiry (first inserted wins ties). If
    /// the store is still over `limit` that entry is evicted. When every
    /// remaining entry is never-expiring, the oldest insertion is evicted
    /// instead so such stores stay bounded.
    pub fn purge(&mut self, limit: usize, now_ms: u64) -> Vec<Purged> {
        let mut purged = Vec::new();
        let mut expired: HashSet<String> = HashSet::new();
        let mut soonest: Option<(&String, u64)> = None;

        for hash in self.order.iter() {
            let Some(entry) = self.entries.get(hash) else {
                continue;
            };
            if entry.is_expired(now_ms) {
                expired.insert(hash.clone());
                continue;
            }
            if let Some(expires) = entry.expires_at {
                match soonest {
                    Some((_, best)) if best <= expires => {}
                    _ => soonest = Some((hash, expires)),
                }
            }
        }
        let soonest = soonest.map(|(hash, _)| hash.clone());

        if !expired.is_empty() {
            for hash in self.order.iter() {
                if expired.contains(hash) {
                    purged.push(Purged {
                        hash: hash.clone(),
                        reason: PurgeReason::Expired,
                    });
                }
            }
            self.entries.retain(|hash, _| !expired.contains(hash));
            self.order.retain(|hash| !expired.contains(hash));
        }

        if self.entries.len() > limit {
            let victim = match soonest {
                Some(hash) => Some((hash, PurgeReason::OverLimit)),
                None => self
                    .order
                    .oldest()
                    .cloned()
                    .map(|hash| (hash, PurgeReason::OverLimitNeverExpiring)),
            };
            if let Some((hash, reason)) = victim {
                self.delete(&hash);
                purged.push(Purged { hash, reason });
            }
        }

        purged
    }
}
