//! Site resolution
//!
//! A [`Resolver`] turns the identity extracted from a hostname into a
//! [`Site`]: its id, canonical domain, `site.yaml` and filesystem (already
//! rooted at the configured public directory).
//!
//! Variants:
//! - [`DatabaseResolver`]: uploaded deployments looked up in a [`SiteStore`]
//! - [`StaticResolver`]: fixed identity → directory table
//! - [`AdHocResolver`]: identity labels mapped onto a directory tree
//!
//! [`CachedResolver`] puts any of them behind the deduplicating TTL cache.

pub mod adhoc;
pub mod cached;
pub mod database;
pub mod static_config;
pub mod store;

pub use adhoc::AdHocResolver;
pub use cached::{CachedResolver, SiteHandle};
pub use database::DatabaseResolver;
pub use static_config::StaticResolver;
pub use store::{
    App, AppConfig, Deployment, MemorySiteStore, SiteDeclaration, SiteStore, StoreError,
};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{SiteConfig, SiteConfigError};
use crate::hostid::HostIdScheme;
use crate::vfs::{FileSystem, SubFs};

/// Resolution failure. Cloned when the TTL cache replays a cached error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("site not found")]
    NotFound,

    #[error("invalid deployment for {site}: {reason}")]
    InvalidDeployment { site: String, reason: String },

    #[error("invalid site configuration for {site}: {message}")]
    InvalidConfig { site: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("filesystem error for {site}: {message}")]
    Filesystem { site: String, message: String },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound)
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ResolveError::NotFound => 404,
            _ => 500,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotFound => "not_found",
            ResolveError::InvalidDeployment { .. } => "invalid_deployment",
            ResolveError::InvalidConfig { .. } => "invalid_config",
            ResolveError::Store(_) => "store",
            ResolveError::Filesystem { .. } => "filesystem",
        }
    }
}

/// A resolved site
pub struct Site {
    /// Stable identifier, e.g. `acme/main`
    pub id: String,
    /// Canonical host; requests for other hosts are redirected here
    pub domain: Option<String>,
    pub config: SiteConfig,
    /// Files served for this site, rooted at `config.public`
    pub fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError> {
        (**self).resolve(identity).await
    }
}

/// Which site an identity without sub-identity refers to
#[derive(Debug, Clone)]
pub struct DefaultSite {
    pub name: String,
    pub enabled: bool,
}

impl DefaultSite {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }

    /// Apply the alias to a sub-identity; `None` means not found.
    pub fn alias<'a>(&'a self, sub: &'a str) -> Option<&'a str> {
        if !sub.is_empty() {
            Some(sub)
        } else if self.enabled && !self.name.is_empty() {
            Some(&self.name)
        } else {
            None
        }
    }
}

/// Canonical identity for the static resolver: tenant and site joined with
/// the scheme, or the bare site name for the tenant-less identity.
pub(crate) fn canonical_identity(
    scheme: HostIdScheme,
    default_site: &DefaultSite,
    identity: &str,
) -> Option<String> {
    let (main, sub) = scheme.split(identity);
    let sub = default_site.alias(&sub)?;
    if main.is_empty() {
        Some(sub.to_string())
    } else {
        Some(scheme.make(&main, sub))
    }
}

/// Load `site.yaml` from `root` and build the site around it.
pub(crate) async fn load_site(
    id: String,
    domain: Option<String>,
    root: Arc<dyn FileSystem>,
) -> Result<Site, ResolveError> {
    let config = SiteConfig::load(root.as_ref())
        .await
        .map_err(|e| match e {
            SiteConfigError::NotFound => ResolveError::NotFound,
            SiteConfigError::Invalid(message) => ResolveError::InvalidConfig {
                site: id.clone(),
                message,
            },
            SiteConfigError::Read(err) => ResolveError::Filesystem {
                site: id.clone(),
                message: err.to_string(),
            },
        })?;

    let fs = SubFs::wrap(root, &config.public);
    if !fs.stat("/").await.map(|info| info.is_dir).unwrap_or(false) {
        return Err(ResolveError::InvalidConfig {
            site: id,
            message: format!("public directory {} does not exist", config.public),
        });
    }

    Ok(Site {
        id,
        domain,
        config,
        fs,
    })
}
