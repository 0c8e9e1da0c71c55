//! Cache Statistics Module
//!
//! Tracks cache effectiveness: hits, negative hits, misses and write failures.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served with a resolved value
    pub hits: u64,
    /// Lookups served from a still-valid failure entry
    pub negative_hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped on read because their TTL elapsed
    pub expired: u64,
    /// Entries dropped on read because they could not be decoded
    pub corrupt: u64,
    /// Successful writes to the backing storage
    pub writes: u64,
    /// Writes the backing storage rejected
    pub write_failures: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the share of lookups answered from cache, negative hits included.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.negative_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_negative_hit(&mut self) {
        self.negative_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Expired ==
    /// Counts an expired entry; the lookup itself is also a miss.
    pub fn record_expired(&mut self) {
        self.expired += 1;
        self.misses += 1;
    }

    // == Record Corrupt ==
    /// Counts an undecodable entry; the lookup itself is also a miss.
    pub fn record_corrupt(&mut self) {
        self.corrupt += 1;
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }
}
