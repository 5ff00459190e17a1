//! Insertion Order Module
//!
//! Tracks the order in which hashes were inserted into an entry store. The
//! order drives the eviction scan and the never-expiring fallback.

use std::collections::VecDeque;

// == Insertion Order ==
/// Tracks insertion order of store hashes.
///
/// Hashes are stored in a VecDeque where:
/// - Front = Oldest insertion
/// - Back = Newest insertion
#[derive(Debug, Default)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Record ==
    /// Marks a hash as newly inserted (moves to back).
    ///
    /// Re-inserting an existing hash counts as a fresh insertion. Finding the
    /// old position is a linear scan, so this is O(n) in the tracked count.
    pub fn record(&mut self, hash: &str) {
        self.remove(hash);
        self.order.push_back(hash.to_string());
    }

    // == Remove ==
    /// Removes a hash from the tracker. O(n) scan of the queue; stores are
    /// bounded by their size limit, which keeps n small.
    pub fn remove(&mut self, hash: &str) {
        if let Some(pos) = self.order.iter().position(|h| h == hash) {
            self.order.remove(pos);
        }
    }

    // == Oldest ==
    /// Returns the oldest tracked hash without removing it.
    pub fn oldest(&self) -> Option<&String> {
        self.order.front()
    }

    /// Iterates hashes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Keeps only the hashes for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.order.retain(|h| keep(h));
    }

    /// Drops every tracked hash.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked hashes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
