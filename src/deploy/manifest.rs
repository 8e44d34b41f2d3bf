//! Deployment manifest
//!
//! The manifest lists every file of a deployment with its size, SHA-256 and
//! content type. It travels as JSON next to the archive and is the source of
//! truth for serving: the edge never lists storage.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::{self, Read};

use super::DeployError;

/// One file (or, with a trailing `/`, one directory) of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative path, `/`-separated, no leading slash
    pub path: String,
    pub size: u64,
    /// Lower-case hex SHA-256 of the raw bytes
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
}

impl ManifestEntry {
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(files: Vec<ManifestEntry>) -> Self {
        Self { files }
    }

    pub fn from_json(data: &[u8]) -> Result<Self, DeployError> {
        serde_json::from_slice(data).map_err(|e| DeployError::InvalidManifest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DeployError> {
        serde_json::to_string_pretty(self).map_err(|e| DeployError::InvalidManifest(e.to_string()))
    }

    /// Regular file entries
    pub fn regular_files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.files.iter().filter(|entry| !entry.is_dir())
    }

    pub fn file_count(&self) -> usize {
        self.regular_files().count()
    }

    pub fn total_size(&self) -> u64 {
        self.regular_files().map(|entry| entry.size).sum()
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Structural checks: relative normalized paths, no duplicates,
    /// well-formed hashes.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut seen = HashSet::new();
        for entry in &self.files {
            if !is_valid_path(&entry.path) {
                return Err(DeployError::InvalidManifest(format!(
                    "invalid path: {:?}",
                    entry.path
                )));
            }
            if !seen.insert(entry.path.as_str()) {
                return Err(DeployError::InvalidManifest(format!(
                    "duplicate path: {}",
                    entry.path
                )));
            }
            if !entry.is_dir() && !is_valid_hash(&entry.hash) {
                return Err(DeployError::InvalidManifest(format!(
                    "invalid hash for {}: {:?}",
                    entry.path, entry.hash
                )));
            }
        }
        Ok(())
    }
}

fn is_valid_path(path: &str) -> bool {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    !trimmed.is_empty()
        && !trimmed.starts_with('/')
        && !trimmed.contains('\\')
        && trimmed
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// SHA-256 of `data` as lower-case hex
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stream `reader` through SHA-256, returning `(hash, bytes read)`.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let size = io::copy(reader, &mut hasher)?;
    Ok((hex::encode(hasher.finalize()), size))
}
