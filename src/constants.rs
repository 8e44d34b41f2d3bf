// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

// =============================================================================
// Site resolution defaults
// =============================================================================

/// Default lifetime of a resolved site (and of a cached resolution error)
pub const DEFAULT_SITE_TTL_SECS: u64 = 60;

/// Default bound on the number of distinct identities kept in the site cache
pub const DEFAULT_MAX_SITES: u64 = 10_000;

/// Default site name used when a hostname carries no sub-identity
pub const DEFAULT_SITE_NAME: &str = "main";

/// Name of the per-site configuration file discovered in the site root
pub const SITE_CONFIG_FILE: &str = "site.yaml";

// =============================================================================
// Content cache defaults
// =============================================================================

/// Default maximum item size in megabytes
pub const DEFAULT_MAX_ITEM_SIZE_MB: u64 = 10;

/// Default maximum content cache size in megabytes
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 256;

// =============================================================================
// Response defaults
// =============================================================================

/// Far-future cache control; `no-cache` forces revalidation against the ETag
pub const CACHE_CONTROL_VALUE: &str = "public, max-age=31536000, no-cache";

/// Index page appended to directory paths
pub const INDEX_PAGE: &str = "index.html";

// =============================================================================
// Deployment defaults
// =============================================================================

/// Default maximum number of files in one deployment
pub const DEFAULT_MAX_DEPLOYMENT_FILES: usize = 10_000;

/// Default maximum total (uncompressed) deployment size (512 MB)
pub const DEFAULT_MAX_DEPLOYMENT_SIZE: u64 = 512 * 1024 * 1024;

/// Per-entry tar overhead allowance used to bound decompression
pub const TAR_ENTRY_OVERHEAD: u64 = 1024;

/// Tar block size
pub const TAR_BLOCK_SIZE: u64 = 512;

/// Longest path that fits the name field of a plain ustar header
pub const TAR_NAME_FIELD_LEN: usize = 100;

/// Room for the length, key and newline of a PAX `path` record
pub const TAR_PAX_RECORD_OVERHEAD: u64 = 32;

// =============================================================================
// Streaming defaults
// =============================================================================

/// Chunk size when streaming file bodies to clients
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_cache_defaults_are_consistent() {
        assert!(DEFAULT_MAX_ITEM_SIZE_MB <= DEFAULT_MAX_CACHE_SIZE_MB);
    }

    #[test]
    fn test_cache_control_forces_revalidation() {
        assert!(CACHE_CONTROL_VALUE.contains("no-cache"));
        assert!(CACHE_CONTROL_VALUE.contains("max-age=31536000"));
    }
}
