//! Tenant catalog
//!
//! The database resolver reads apps and their active deployments through
//! [`SiteStore`]. [`MemorySiteStore`] keeps everything in process and can be
//! seeded from a YAML catalog:
//!
//! ```yaml
//! apps:
//!   - id: acme
//!     default_site: main
//!     sites:
//!       - pattern: main
//!         domain: www.acme.com
//!       - pattern: "preview-*"
//! deployments:
//!   - id: d-001
//!     app: acme
//!     site: main
//!     prefix: acme/main/d-001/
//!     manifest: manifests/d-001.json
//!     uploaded_at: 2024-05-01T12:00:00Z
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::constants::DEFAULT_SITE_NAME;
use crate::deploy::Manifest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("invalid catalog: {0}")]
    Invalid(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A site name pattern declared by an app; `*` matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDeclaration {
    pub pattern: String,
    /// Canonical host for matching sites; `*` is replaced by the site name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl SiteDeclaration {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    fn to_regex(&self) -> Result<Regex, String> {
        let body = self
            .pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Regex::new(&format!("^{}$", body))
            .map_err(|e| format!("invalid site pattern '{}': {}", self.pattern, e))
    }

    pub fn matches(&self, site: &str) -> Result<bool, String> {
        Ok(self.to_regex()?.is_match(site))
    }

    pub fn domain_for(&self, site: &str) -> Option<String> {
        self.domain.as_ref().map(|domain| domain.replace('*', site))
    }
}

fn default_site_name() -> String {
    DEFAULT_SITE_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_site_name")]
    pub default_site: String,
    #[serde(default)]
    pub sites: Vec<SiteDeclaration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_site: default_site_name(),
            sites: Vec::new(),
        }
    }
}

impl AppConfig {
    /// First declaration whose pattern matches `site`.
    pub fn match_site(&self, site: &str) -> Result<Option<&SiteDeclaration>, String> {
        for declaration in &self.sites {
            if declaration.matches(site)? {
                return Ok(Some(declaration));
            }
        }
        Ok(None)
    }

    pub fn validate(&self) -> Result<(), String> {
        for declaration in &self.sites {
            if declaration.pattern.is_empty() {
                return Err("site pattern cannot be empty".to_string());
            }
            declaration.to_regex()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    #[serde(flatten)]
    pub config: AppConfig,
}

/// The deployment currently serving a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    pub app_id: String,
    pub site: String,
    /// Prepended to manifest paths to form blob keys
    pub storage_prefix: String,
    pub manifest: Manifest,
    /// `None` until the archive has been ingested
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get_app(&self, app_id: &str) -> Result<App, StoreError>;

    async fn get_active_site_deployment(
        &self,
        app_id: &str,
        site: &str,
    ) -> Result<Deployment, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySiteStore {
    apps: RwLock<HashMap<String, App>>,
    deployments: RwLock<HashMap<(String, String), Deployment>>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    apps: Vec<App>,
    #[serde(default)]
    deployments: Vec<CatalogDeployment>,
}

#[derive(Debug, Deserialize)]
struct CatalogDeployment {
    id: String,
    app: String,
    site: String,
    prefix: String,
    /// Path of the manifest JSON, relative to the catalog file
    manifest: String,
    #[serde(default)]
    uploaded_at: Option<DateTime<Utc>>,
}

impl MemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_app(&self, app: App) {
        self.apps.write().await.insert(app.id.clone(), app);
    }

    /// Make `deployment` the active one for its site.
    pub async fn activate(&self, deployment: Deployment) {
        let key = (deployment.app_id.clone(), deployment.site.clone());
        self.deployments.write().await.insert(key, deployment);
    }

    /// Load a YAML catalog. Manifest paths are relative to the catalog file.
    pub fn from_catalog_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Invalid(format!("failed to read {}: {}", path.display(), e))
        })?;
        let catalog: Catalog =
            serde_yaml::from_str(&yaml).map_err(|e| StoreError::Invalid(e.to_string()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut apps = HashMap::with_capacity(catalog.apps.len());
        for app in catalog.apps {
            app.config
                .validate()
                .map_err(|e| StoreError::Invalid(format!("app {}: {}", app.id, e)))?;
            apps.insert(app.id.clone(), app);
        }

        let mut deployments = HashMap::with_capacity(catalog.deployments.len());
        for entry in catalog.deployments {
            if !apps.contains_key(&entry.app) {
                return Err(StoreError::Invalid(format!(
                    "deployment {} references unknown app {}",
                    entry.id, entry.app
                )));
            }
            let manifest_path = base.join(&entry.manifest);
            let data = std::fs::read(&manifest_path).map_err(|e| {
                StoreError::Invalid(format!(
                    "failed to read manifest {}: {}",
                    manifest_path.display(),
                    e
                ))
            })?;
            let manifest = Manifest::from_json(&data)
                .and_then(|manifest| manifest.validate().map(|_| manifest))
                .map_err(|e| StoreError::Invalid(format!("deployment {}: {}", entry.id, e)))?;

            deployments.insert(
                (entry.app.clone(), entry.site.clone()),
                Deployment {
                    id: entry.id,
                    app_id: entry.app,
                    site: entry.site,
                    storage_prefix: entry.prefix,
                    manifest,
                    uploaded_at: entry.uploaded_at,
                },
            );
        }

        Ok(Self {
            apps: RwLock::new(apps),
            deployments: RwLock::new(deployments),
        })
    }
}

#[async_trait]
impl SiteStore for MemorySiteStore {
    async fn get_app(&self, app_id: &str) -> Result<App, StoreError> {
        self.apps
            .read()
            .await
            .get(app_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_active_site_deployment(
        &self,
        app_id: &str,
        site: &str,
    ) -> Result<Deployment, StoreError> {
        self.deployments
            .read()
            .await
            .get(&(app_id.to_string(), site.to_string()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_pattern_glob() {
        let declaration = SiteDeclaration::new("preview-*");
        assert!(declaration.matches("preview-123").unwrap());
        assert!(declaration.matches("preview-").unwrap());
        assert!(!declaration.matches("main").unwrap());

        let literal = SiteDeclaration::new("a.b");
        assert!(literal.matches("a.b").unwrap());
        assert!(!literal.matches("axb").unwrap());
    }

    #[test]
    fn test_domain_substitution() {
        let declaration = SiteDeclaration::new("*").with_domain("*.docs.example.com");
        assert_eq!(
            declaration.domain_for("v2").as_deref(),
            Some("v2.docs.example.com")
        );
        assert_eq!(SiteDeclaration::new("*").domain_for("v2"), None);
    }

    #[test]
    fn test_match_site_first_wins() {
        let config = AppConfig {
            default_site: "main".to_string(),
            sites: vec![
                SiteDeclaration::new("main").with_domain("www.acme.com"),
                SiteDeclaration::new("*"),
            ],
        };
        let main = config.match_site("main").unwrap().unwrap();
        assert_eq!(main.domain.as_deref(), Some("www.acme.com"));
        let other = config.match_site("docs").unwrap().unwrap();
        assert_eq!(other.pattern, "*");
    }

    #[tokio::test]
    async fn test_memory_store_lookups() {
        let store = MemorySiteStore::new();
        store
            .put_app(App {
                id: "acme".to_string(),
                config: AppConfig::default(),
            })
            .await;
        store
            .activate(Deployment {
                id: "d1".to_string(),
                app_id: "acme".to_string(),
                site: "main".to_string(),
                storage_prefix: "acme/main/d1/".to_string(),
                manifest: Manifest::default(),
                uploaded_at: None,
            })
            .await;

        assert_eq!(store.get_app("acme").await.unwrap().config.default_site, "main");
        assert_eq!(store.get_app("other").await, Err(StoreError::NotFound));
        assert_eq!(
            store
                .get_active_site_deployment("acme", "main")
                .await
                .unwrap()
                .id,
            "d1"
        );
        assert_eq!(
            store.get_active_site_deployment("acme", "docs").await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("d1.json"),
            r#"{"files":[{"path":"index.html","size":2,"hash":"4d7c71e5f9d2a8d1b0e8a2a3b9a6b1c1f0e9d8c7b6a5f4e3d2c1b0a9f8e7d6c5"}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("catalog.yaml"),
            r#"
apps:
  - id: acme
    sites:
      - pattern: main
        domain: www.acme.com
deployments:
  - id: d1
    app: acme
    site: main
    prefix: acme/main/d1/
    manifest: d1.json
    uploaded_at: 2024-05-01T12:00:00Z
"#,
        )
        .unwrap();

        let store = MemorySiteStore::from_catalog_file(dir.path().join("catalog.yaml")).unwrap();
        let app = store.get_app("acme").await.unwrap();
        assert_eq!(app.config.default_site, "main");
        let deployment = store.get_active_site_deployment("acme", "main").await.unwrap();
        assert_eq!(deployment.manifest.files.len(), 1);
        assert!(deployment.uploaded_at.is_some());
    }

    #[test]
    fn test_catalog_rejects_unknown_app() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("catalog.yaml"),
            "deployments:\n  - id: d1\n    app: ghost\n    site: main\n    prefix: p/\n    manifest: m.json\n",
        )
        .unwrap();
        let err = MemorySiteStore::from_catalog_file(dir.path().join("catalog.yaml")).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
