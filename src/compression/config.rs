/// Response compression settings
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::algorithms::{AlgorithmConfig, Compression};
use super::error::CompressionError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compress responses when the client accepts it (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Level used by algorithms without their own `level`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,

    /// Smaller files are always served as-is (default: 1KB)
    #[serde(default = "default_min_size")]
    pub min_size_bytes: u64,

    /// Larger files are always served as-is (default: 10MB)
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Per-algorithm settings; algorithms missing from the table are enabled
    #[serde(default)]
    pub algorithms: HashMap<Compression, AlgorithmConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_min_size() -> u64 {
    1024 // 1KB
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

impl CompressionConfig {
    pub fn new() -> Self {
        CompressionConfig {
            enabled: default_enabled(),
            level: None,
            min_size_bytes: default_min_size(),
            max_size_bytes: default_max_size(),
            algorithms: HashMap::new(),
        }
    }

    /// Compression turned off entirely
    pub fn disabled() -> Self {
        CompressionConfig {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn validate(&self) -> Result<(), CompressionError> {
        if self.min_size_bytes >= self.max_size_bytes {
            return Err(CompressionError::InvalidConfig(
                "min_size_bytes must be less than max_size_bytes".to_string(),
            ));
        }

        for algo in Compression::PREFERENCE {
            let level = self.level_for(algo);
            if level == 0 || level > algo.max_level() {
                return Err(CompressionError::InvalidConfig(format!(
                    "{} level must be 1-{}, got {}",
                    algo,
                    algo.max_level(),
                    level
                )));
            }
        }

        let any_enabled = Compression::PREFERENCE
            .iter()
            .any(|algo| self.is_algorithm_enabled(*algo));
        if self.enabled && !any_enabled {
            return Err(CompressionError::InvalidConfig(
                "at least one compression algorithm must be enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_algorithm_enabled(&self, algo: Compression) -> bool {
        self.algorithms
            .get(&algo)
            .map(|cfg| cfg.enabled)
            .unwrap_or(true)
    }

    /// Effective level: algorithm override, then global level, then the
    /// algorithm's own default.
    pub fn level_for(&self, algo: Compression) -> u32 {
        self.algorithms
            .get(&algo)
            .and_then(|cfg| cfg.level)
            .or(self.level)
            .unwrap_or_else(|| algo.default_level())
    }

    /// Whether a body of `size` bytes is worth compressing
    pub fn size_in_range(&self, size: u64) -> bool {
        size >= self.min_size_bytes && size <= self.max_size_bytes
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompressionConfig::new();
        assert!(config.enabled);
        assert_eq!(config.min_size_bytes, 1024);
        assert!(config.validate().is_ok());
        assert!(config.is_algorithm_enabled(Compression::Deflate));
        assert_eq!(config.level_for(Compression::Brotli), 5);
        assert_eq!(config.level_for(Compression::Gzip), 6);
    }

    #[test]
    fn test_level_precedence() {
        let mut config = CompressionConfig::new();
        config.level = Some(4);
        config
            .algorithms
            .insert(Compression::Brotli, AlgorithmConfig::with_level(11));
        assert_eq!(config.level_for(Compression::Brotli), 11);
        assert_eq!(config.level_for(Compression::Gzip), 4);
    }

    #[test]
    fn test_validate_rejects_out_of_range_levels() {
        let mut config = CompressionConfig::new();
        config.level = Some(10);
        // 10 is fine for brotli but not for gzip
        assert!(config.validate().is_err());

        config.level = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_size_window() {
        let mut config = CompressionConfig::new();
        config.min_size_bytes = 1000;
        config.max_size_bytes = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_needs_an_algorithm() {
        let mut config = CompressionConfig::new();
        for algo in Compression::PREFERENCE {
            config.algorithms.insert(algo, AlgorithmConfig::disabled());
        }
        assert!(config.validate().is_err());

        config.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_algorithm_table() {
        let yaml = r#"
level: 5
algorithms:
  br:
    level: 9
  deflate:
    enabled: false
"#;
        let config: CompressionConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.level_for(Compression::Brotli), 9);
        assert!(!config.is_algorithm_enabled(Compression::Deflate));
        assert!(config.size_in_range(4096));
        assert!(!config.size_in_range(10));
    }
}
