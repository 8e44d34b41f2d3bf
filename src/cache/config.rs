//! Cache configuration types
//!
//! This module defines configuration structures for the two caches:
//! - Site resolution cache (TTL + bounded key count)
//! - Content cache (byte-cost bounded)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_CACHE_SIZE_MB, DEFAULT_MAX_ITEM_SIZE_MB, DEFAULT_MAX_SITES, DEFAULT_SITE_TTL_SECS,
};

/// Main cache configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_site_ttl_seconds")]
    pub site_ttl_seconds: u64,
    /// Lifetime of a cached resolution error; defaults to `site_ttl_seconds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_ttl_seconds: Option<u64>,
    #[serde(default = "default_max_sites")]
    pub max_sites: u64,
    #[serde(default)]
    pub content: ContentCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            site_ttl_seconds: default_site_ttl_seconds(),
            error_ttl_seconds: None,
            max_sites: default_max_sites(),
            content: ContentCacheConfig::default(),
        }
    }
}

fn default_site_ttl_seconds() -> u64 {
    DEFAULT_SITE_TTL_SECS
}

fn default_max_sites() -> u64 {
    DEFAULT_MAX_SITES
}

impl CacheConfig {
    pub fn site_ttl(&self) -> Duration {
        Duration::from_secs(self.site_ttl_seconds)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(self.error_ttl_seconds.unwrap_or(self.site_ttl_seconds))
    }

    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.site_ttl_seconds == 0 {
            return Err("cache.site_ttl_seconds must be greater than 0".to_string());
        }
        if self.max_sites == 0 {
            return Err("cache.max_sites must be greater than 0".to_string());
        }
        if let Some(error_ttl) = self.error_ttl_seconds {
            if error_ttl > self.site_ttl_seconds {
                return Err(format!(
                    "cache.error_ttl_seconds ({}) cannot be greater than site_ttl_seconds ({})",
                    error_ttl, self.site_ttl_seconds
                ));
            }
        }
        self.content.validate()
    }
}

/// Content cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_item_size_mb")]
    pub max_item_size_mb: u64,
    #[serde(default = "default_max_cache_size_mb")]
    pub max_cache_size_mb: u64,
}

impl Default for ContentCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_item_size_mb: default_max_item_size_mb(),
            max_cache_size_mb: default_max_cache_size_mb(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_item_size_mb() -> u64 {
    DEFAULT_MAX_ITEM_SIZE_MB
}

fn default_max_cache_size_mb() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_MB
}

impl ContentCacheConfig {
    /// Convert max_item_size_mb to bytes
    pub fn max_item_size_bytes(&self) -> u64 {
        self.max_item_size_mb * 1024 * 1024
    }

    /// Convert max_cache_size_mb to bytes
    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb * 1024 * 1024
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_item_size_mb > self.max_cache_size_mb {
            return Err(format!(
                "max_item_size_mb ({}) cannot be greater than max_cache_size_mb ({})",
                self.max_item_size_mb, self.max_cache_size_mb
            ));
        }
        Ok(())
    }
}
