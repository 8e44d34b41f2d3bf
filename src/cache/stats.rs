//! Cache statistics types
//!
//! This module provides structures for tracking cache performance metrics:
//! - `CacheStatsTracker`: lock-free counters shared with eviction listeners
//! - `CacheStats`: point-in-time snapshot (hits, misses, loads, byte costs)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring and metrics
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of loader invocations (TTL cache only)
    pub loads: u64,
    /// Number of entries removed (size pressure, replacement, expiry)
    pub evictions: u64,
    /// Total byte cost accepted by `set`
    pub admitted_bytes: u64,
    /// Total byte cost removed again
    pub evicted_bytes: u64,
    /// Current retained byte cost
    pub current_size_bytes: u64,
    /// Current number of items in cache
    pub current_item_count: u64,
    /// Maximum cache size in bytes
    pub max_size_bytes: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total requests)
    /// Returns 0.0 if there are no requests
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
    admitted_bytes: AtomicU64,
    evicted_bytes: AtomicU64,
}

impl CacheStatsTracker {
    /// Create a new stats tracker with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loads(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self, bytes: u64) {
        self.admitted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, bytes: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.evicted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(
        &self,
        current_size_bytes: u64,
        current_item_count: u64,
        max_size_bytes: u64,
    ) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            admitted_bytes: self.admitted_bytes.load(Ordering::Relaxed),
            evicted_bytes: self.evicted_bytes.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
            max_size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_with_no_requests_is_zero() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_tracker_snapshot() {
        let tracker = CacheStatsTracker::new();
        tracker.increment_hits();
        tracker.increment_hits();
        tracker.increment_misses();
        tracker.increment_loads();
        tracker.record_admitted(100);
        tracker.record_evicted(40);

        let stats = tracker.snapshot(60, 1, 1024);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.admitted_bytes, 100);
        assert_eq!(stats.evicted_bytes, 40);
        assert_eq!(stats.current_size_bytes, 60);
        assert_eq!(stats.current_item_count, 1);
        assert_eq!(stats.max_size_bytes, 1024);
    }
}
