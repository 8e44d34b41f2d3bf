//! Caching layers
//!
//! - [`ttl`]: deduplicating TTL cache used for site resolution
//! - [`content`]: byte-bounded cache of encoded file bodies
//! - [`config`]: configuration for both
//! - [`stats`]: shared counters and snapshots

pub mod config;
pub mod content;
pub mod stats;
pub mod ttl;

pub use config::{CacheConfig, ContentCacheConfig};
pub use content::{ContentCache, ContentKey};
pub use stats::CacheStats;
pub use ttl::DedupCache;
