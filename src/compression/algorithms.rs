/// Content-Encoding algorithms
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::CompressionError;

/// Supported response encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Brotli (RFC 7932)
    #[serde(rename = "br")]
    Brotli,
    /// GZIP (RFC 1952)
    Gzip,
    /// DEFLATE (RFC 1951)
    Deflate,
}

impl Compression {
    /// Server preference when the client accepts several encodings equally
    pub const PREFERENCE: [Compression; 3] =
        [Compression::Brotli, Compression::Gzip, Compression::Deflate];

    /// `Content-Encoding` token
    pub fn to_header_value(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Brotli => "br",
            Compression::Deflate => "deflate",
        }
    }

    /// Level used when neither the algorithm nor the global config sets one
    pub fn default_level(&self) -> u32 {
        match self {
            Compression::Brotli => 5,
            Compression::Gzip | Compression::Deflate => 6,
        }
    }

    /// Highest level the encoder accepts
    pub fn max_level(&self) -> u32 {
        match self {
            Compression::Brotli => 11,
            Compression::Gzip | Compression::Deflate => 9,
        }
    }
}

impl FromStr for Compression {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Ok(Compression::Gzip),
            "br" | "brotli" => Ok(Compression::Brotli),
            "deflate" => Ok(Compression::Deflate),
            other => Err(CompressionError::InvalidAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_header_value())
    }
}

fn default_enabled() -> bool {
    true
}

/// Per-algorithm settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the global `level` for this algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
        }
    }
}

impl AlgorithmConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            level: None,
        }
    }

    pub fn with_level(level: u32) -> Self {
        Self {
            enabled: true,
            level: Some(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values() {
        assert_eq!(Compression::Gzip.to_header_value(), "gzip");
        assert_eq!(Compression::Brotli.to_header_value(), "br");
        assert_eq!(Compression::Deflate.to_string(), "deflate");
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(Compression::from_str("GZIP").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_str("x-gzip").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_str("br").unwrap(), Compression::Brotli);
        assert_eq!(Compression::from_str(" deflate ").unwrap(), Compression::Deflate);
        assert!(Compression::from_str("identity").is_err());
        assert!(Compression::from_str("").is_err());
    }

    #[test]
    fn test_levels() {
        assert_eq!(Compression::Brotli.max_level(), 11);
        assert_eq!(Compression::Gzip.max_level(), 9);
        assert!(Compression::PREFERENCE
            .iter()
            .all(|algo| algo.default_level() <= algo.max_level()));
    }

    #[test]
    fn test_algorithm_config_yaml() {
        let config: AlgorithmConfig = serde_yaml::from_str("level: 9").unwrap();
        assert!(config.enabled);
        assert_eq!(config.level, Some(9));
        assert!(!AlgorithmConfig::disabled().enabled);
    }
}
