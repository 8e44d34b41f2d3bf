//! Per-site configuration
//!
//! Every site carries a `site.yaml` at the root of its files:
//!
//! ```yaml
//! public: dist        # directory served as the site root (default "/")
//! spa: true           # fall back to the nearest existing parent (default true)
//! not_found: 404.html # optional page served with 404 responses
//! ```
//!
//! A site without `site.yaml` does not exist as far as the edge is concerned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::SITE_CONFIG_FILE;
use crate::vfs::{clean_path, read_to_bytes, FileSystem, FsError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiteConfigError {
    #[error("site configuration not found")]
    NotFound,

    #[error("invalid site configuration: {0}")]
    Invalid(String),

    #[error("failed to read site configuration: {0}")]
    Read(FsError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default = "default_public")]
    pub public: String,
    #[serde(default = "default_spa")]
    pub spa: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<String>,
}

fn default_public() -> String {
    "/".to_string()
}

fn default_spa() -> bool {
    true
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            public: default_public(),
            spa: default_spa(),
            not_found: None,
        }
    }
}

impl SiteConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, SiteConfigError> {
        // An empty file is a valid, all-defaults configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: SiteConfig =
            serde_yaml::from_str(yaml).map_err(|e| SiteConfigError::Invalid(e.to_string()))?;
        config.public = clean_path(&config.public);
        if let Some(not_found) = &config.not_found {
            if not_found.trim().is_empty() {
                return Err(SiteConfigError::Invalid(
                    "not_found must name a file".to_string(),
                ));
            }
            config.not_found = Some(clean_path(not_found));
        }
        Ok(config)
    }

    /// Load `site.yaml` from the root of `fs`.
    pub async fn load(fs: &dyn FileSystem) -> Result<Self, SiteConfigError> {
        let path = format!("/{}", SITE_CONFIG_FILE);
        let data = read_to_bytes(fs, &path).await.map_err(|e| match e {
            FsError::NotFound(_) | FsError::IsDirectory(_) => SiteConfigError::NotFound,
            other => SiteConfigError::Read(other),
        })?;

        let yaml = std::str::from_utf8(&data)
            .map_err(|e| SiteConfigError::Invalid(format!("not UTF-8: {}", e)))?;
        Self::from_yaml(yaml)
    }
}
