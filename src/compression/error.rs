/// Compression error types
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// Unknown `Content-Encoding` token
    InvalidAlgorithm(String),
    CompressionFailed(String),
    /// Corrupt input or output over the size bound
    DecompressionFailed(String),
    InvalidConfig(String),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::InvalidAlgorithm(token) => {
                write!(f, "Unsupported content encoding: {}", token)
            }
            CompressionError::CompressionFailed(msg) => {
                write!(f, "Compression failed: {}", msg)
            }
            CompressionError::DecompressionFailed(msg) => {
                write!(f, "Decompression failed: {}", msg)
            }
            CompressionError::InvalidConfig(msg) => {
                write!(f, "Invalid compression configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompressionError {}
