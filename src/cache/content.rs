//! Content cache
//!
//! Holds encoded file bodies keyed by content hash and encoding. Because
//! deployments are content-addressed, a key never goes stale: the same hash
//! always maps to the same bytes, so entries carry no TTL and are only
//! removed under size pressure.
//!
//! Capacity is measured in stored bytes (moka weigher). Admission is
//! frequency-aware, so `set` may silently decline an entry; callers must
//! treat the cache as a hint.

use bytes::Bytes;
use moka::notification::RemovalCause;
use std::fmt;
use std::sync::Arc;

use super::config::ContentCacheConfig;
use super::stats::{CacheStats, CacheStatsTracker};
use crate::compression::Compression;

/// Cache key: content hash plus the encoding the body is stored in.
/// `encoding == None` is the identity (uncompressed) representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub hash: String,
    pub encoding: Option<Compression>,
}

impl ContentKey {
    pub fn new(hash: impl Into<String>, encoding: Option<Compression>) -> Self {
        Self {
            hash: hash.into(),
            encoding,
        }
    }

    pub fn identity(hash: impl Into<String>) -> Self {
        Self::new(hash, None)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            Some(encoding) => write!(f, "{}:{}", self.hash, encoding),
            None => write!(f, "{}:identity", self.hash),
        }
    }
}

/// Byte-bounded cache of file bodies
pub struct ContentCache {
    cache: Option<moka::future::Cache<ContentKey, Bytes>>,
    stats: Arc<CacheStatsTracker>,
    max_item_size_bytes: u64,
    max_size_bytes: u64,
}

impl ContentCache {
    pub fn new(max_size_bytes: u64, max_item_size_bytes: u64) -> Self {
        if max_size_bytes == 0 {
            return Self::disabled();
        }

        // Shared with the eviction listener
        let stats = Arc::new(CacheStatsTracker::new());
        let listener_stats = Arc::clone(&stats);

        let cache = moka::future::Cache::builder()
            .max_capacity(max_size_bytes)
            .weigher(|_key, body: &Bytes| body.len().try_into().unwrap_or(u32::MAX))
            .eviction_listener(move |_key, body: Bytes, cause| {
                // Every removal gives its cost back, including rejected
                // admissions and replacements
                if matches!(
                    cause,
                    RemovalCause::Size
                        | RemovalCause::Replaced
                        | RemovalCause::Explicit
                        | RemovalCause::Expired
                ) {
                    listener_stats.record_evicted(body.len() as u64);
                }
            })
            .build();

        Self {
            cache: Some(cache),
            stats,
            max_item_size_bytes,
            max_size_bytes,
        }
    }

    pub fn from_config(config: &ContentCacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(config.max_cache_size_bytes(), config.max_item_size_bytes())
    }

    /// A cache that stores nothing; every `get` misses.
    pub fn disabled() -> Self {
        Self {
            cache: None,
            stats: Arc::new(CacheStatsTracker::new()),
            max_item_size_bytes: 0,
            max_size_bytes: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Whether a body of `size` bytes could ever be stored
    pub fn accepts(&self, size: u64) -> bool {
        self.is_enabled() && size <= self.max_item_size_bytes
    }

    pub async fn get(&self, key: &ContentKey) -> Option<Bytes> {
        let found = match &self.cache {
            Some(cache) => cache.get(key).await,
            None => None,
        };

        if found.is_some() {
            self.stats.increment_hits();
        } else {
            self.stats.increment_misses();
        }
        found
    }

    /// Offer `body` to the cache. Oversized bodies are dropped; others may
    /// still be declined by the admission policy.
    pub async fn set(&self, key: ContentKey, body: Bytes) {
        let Some(cache) = &self.cache else {
            return;
        };

        let cost = body.len() as u64;
        if cost > self.max_item_size_bytes {
            tracing::trace!(key = %key, cost, "content too large to cache");
            return;
        }

        self.stats.record_admitted(cost);
        cache.insert(key, body).await;
    }

    /// Process pending admissions and evictions so that the size accounting
    /// is exact.
    pub async fn run_pending_tasks(&self) {
        if let Some(cache) = &self.cache {
            cache.run_pending_tasks().await;
        }
    }

    pub fn weighted_size(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| cache.weighted_size())
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| cache.entry_count())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
            .snapshot(self.weighted_size(), self.entry_count(), self.max_size_bytes)
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("enabled", &self.is_enabled())
            .field("max_size_bytes", &self.max_size_bytes)
            .field("max_item_size_bytes", &self.max_item_size_bytes)
            .finish()
    }
}
