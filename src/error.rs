// Error types module

use std::fmt;

use crate::deploy::DeployError;
use crate::resolver::StoreError;
use crate::storage::StorageError;

/// Startup and tooling errors
///
/// Request-time failures never surface as `EdgeError`; they are mapped to a
/// status code inside the pipeline.
#[derive(Debug)]
pub enum EdgeError {
    /// Invalid configuration (bad YAML, missing env vars, failed validation)
    Config(String),

    /// Blob storage could not be opened or written
    Storage(StorageError),

    /// Site catalog could not be loaded
    Store(StoreError),

    /// Deployment packing or ingestion failed
    Deploy(DeployError),

    /// Local file I/O outside the storage layer
    Io(String),
}

impl fmt::Display for EdgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            EdgeError::Storage(e) => write!(f, "Storage error: {}", e),
            EdgeError::Store(e) => write!(f, "Site store error: {}", e),
            EdgeError::Deploy(e) => write!(f, "Deployment error: {}", e),
            EdgeError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EdgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EdgeError::Storage(e) => Some(e),
            EdgeError::Store(e) => Some(e),
            EdgeError::Deploy(e) => Some(e),
            EdgeError::Config(_) | EdgeError::Io(_) => None,
        }
    }
}

impl From<StorageError> for EdgeError {
    fn from(e: StorageError) -> Self {
        EdgeError::Storage(e)
    }
}

impl From<StoreError> for EdgeError {
    fn from(e: StoreError) -> Self {
        EdgeError::Store(e)
    }
}

impl From<DeployError> for EdgeError {
    fn from(e: DeployError) -> Self {
        EdgeError::Deploy(e)
    }
}

impl From<std::io::Error> for EdgeError {
    fn from(e: std::io::Error) -> Self {
        EdgeError::Io(e.to_string())
    }
}
