//! Deployment packing and ingestion
//!
//! A deployment travels as two parts: a JSON [`Manifest`] and a gzip
//! compressed tar archive holding exactly the files the manifest lists.
//!
//! Client side: [`collect`] builds the manifest from a directory and
//! [`pack`] writes the archive. Server side: [`extract`] walks the archive
//! against the manifest, [`verify_upload`] additionally checks every hash,
//! and [`ingest`] stores the verified files in a blob store.

mod collect;
mod extract;
mod ingest;
mod manifest;
mod pack;

pub use collect::collect;
pub use extract::extract;
pub use ingest::{ingest, verify_upload, IngestReport, VerifiedFile, VerifiedUpload};
pub use manifest::{hash_bytes, hash_reader, Manifest, ManifestEntry};
pub use pack::pack;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_MAX_DEPLOYMENT_FILES, DEFAULT_MAX_DEPLOYMENT_SIZE};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("too many files: {count} (limit {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("deployment too large: {size} bytes (limit {max})")]
    DeploymentTooLarge { size: u64, max: u64 },

    #[error("unexpected file in archive: {0}")]
    UnexpectedFile(String),

    #[error("unexpected size for {path}: manifest says {expected}, archive has {actual}")]
    UnexpectedFileSize {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("file missing from archive: {0}")]
    MissingFile(String),

    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DeployError {
    /// HTTP status for an upload rejected with this error
    pub fn status_code(&self) -> u16 {
        match self {
            DeployError::TooManyFiles { .. } | DeployError::DeploymentTooLarge { .. } => 413,
            DeployError::Storage(_) => 500,
            _ => 400,
        }
    }
}

impl From<std::io::Error> for DeployError {
    fn from(e: std::io::Error) -> Self {
        DeployError::Io(e.to_string())
    }
}

fn default_max_files() -> usize {
    DEFAULT_MAX_DEPLOYMENT_FILES
}

fn default_max_total_size() -> u64 {
    DEFAULT_MAX_DEPLOYMENT_SIZE
}

/// Upper bounds enforced on a manifest before its archive is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployLimits {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Total uncompressed bytes
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,
}

impl Default for DeployLimits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_total_size: default_max_total_size(),
        }
    }
}

impl DeployLimits {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_files == 0 {
            return Err("deploy.max_files must be greater than 0".to_string());
        }
        if self.max_total_size == 0 {
            return Err("deploy.max_total_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Reject a manifest that exceeds these limits.
    pub fn check(&self, manifest: &Manifest) -> Result<(), DeployError> {
        let count = manifest.file_count();
        if count > self.max_files {
            return Err(DeployError::TooManyFiles {
                count,
                max: self.max_files,
            });
        }
        let size = manifest.total_size();
        if size > self.max_total_size {
            return Err(DeployError::DeploymentTooLarge {
                size,
                max: self.max_total_size,
            });
        }
        Ok(())
    }
}
