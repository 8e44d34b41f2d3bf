// Configuration module

pub mod server;
pub mod site;

pub use server::ServerConfig;
pub use site::{SiteConfig, SiteConfigError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::cache::CacheConfig;
use crate::compression::CompressionConfig;
use crate::constants::DEFAULT_SITE_NAME;
use crate::deploy::DeployLimits;
use crate::hostid::{HostIdScheme, HostPattern};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub hosts: HostsConfig,
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub deploy: DeployLimits,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

/// How hostnames map to site identities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Host pattern with one `*`, e.g. `https://*.pages.example.com`
    pub pattern: String,
    #[serde(default)]
    pub scheme: HostIdScheme,
}

impl HostsConfig {
    pub fn host_pattern(&self) -> HostPattern {
        HostPattern::new(&self.pattern)
    }
}

/// Resolver backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Fixed identity → directory table
    Static,
    /// Identity labels mapped onto a directory tree
    Adhoc,
    /// Uploaded deployments described by a catalog file
    Database,
}

fn default_site_name() -> String {
    DEFAULT_SITE_NAME.to_string()
}

fn default_resolve_default_site() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub kind: ResolverKind,
    /// Root directory (`adhoc`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Identity → directory (`static`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, String>,
    /// Catalog of apps and active deployments (`database`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    /// Blob storage URL for deployment files (`database`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Site served when the hostname carries no sub-identity
    #[serde(default = "default_site_name")]
    pub default_site: String,
    #[serde(default = "default_resolve_default_site")]
    pub resolve_default_site: bool,
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ResolverKind::Static => {
                if self.sites.is_empty() {
                    return Err("resolver.sites must list at least one site".to_string());
                }
                if let Some((identity, _)) = self.sites.iter().find(|(_, dir)| dir.is_empty()) {
                    return Err(format!(
                        "resolver.sites['{}'] has an empty directory",
                        identity
                    ));
                }
            }
            ResolverKind::Adhoc => {
                if self.root.as_deref().map_or(true, str::is_empty) {
                    return Err("resolver.root is required for the adhoc resolver".to_string());
                }
            }
            ResolverKind::Database => {
                if self.catalog.as_deref().map_or(true, str::is_empty) {
                    return Err("resolver.catalog is required for the database resolver".to_string());
                }
                if self.storage.as_deref().map_or(true, str::is_empty) {
                    return Err("resolver.storage is required for the database resolver".to_string());
                }
            }
        }

        if self.resolve_default_site && self.default_site.is_empty() {
            return Err("resolver.default_site cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = None;
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });

        if let Some(var_name) = missing {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;

        if self.hosts.pattern.trim().is_empty() {
            return Err("hosts.pattern cannot be empty".to_string());
        }
        if self.hosts.pattern.matches('*').count() != 1 {
            return Err(format!(
                "hosts.pattern '{}' must contain exactly one '*'",
                self.hosts.pattern
            ));
        }

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            return Err(format!(
                "logging.level '{}' is not a valid filter: {}",
                self.logging.level, e
            ));
        }

        self.resolver.validate()?;
        self.cache.validate()?;
        self.compression
            .validate()
            .map_err(|e| format!("compression: {}", e))?;
        self.deploy.validate()?;
        Ok(())
    }
}
