//! Error types for sitepush-core

use std::path::PathBuf;

use crate::types::FileDescriptor;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core library and the storage backends built on it
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A local path could not be used
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Transport or service failure talking to the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials were rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Bucket or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("{0}")]
    General(String),
}

/// A single file that could not be uploaded
///
/// Carries the descriptor that failed so a caller can inspect the local path
/// or hand the file to another batch.
#[derive(Debug, thiserror::Error)]
#[error("[FAILED] objectKey: {key}, filePath: {}, detail: {source}", .file.path.display())]
pub struct UploadError {
    /// Remote key the upload targeted
    pub key: String,
    /// The file that failed
    pub file: FileDescriptor,
    /// Failure reported by the backend
    #[source]
    pub source: Error,
}

impl UploadError {
    pub fn new(key: impl Into<String>, file: FileDescriptor, source: Error) -> Self {
        Self {
            key: key.into(),
            file,
            source,
        }
    }

    /// Local path of the file that failed
    pub fn local_path(&self) -> &PathBuf {
        &self.file.path
    }
}
