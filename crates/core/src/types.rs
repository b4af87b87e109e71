//! Data model shared by the walker, the classifier and the uploader

use std::path::{Path, PathBuf};

/// One local file to publish
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileDescriptor {
    /// Local filesystem path
    pub path: PathBuf,
    /// Target path before the remote prefix is stripped, `/` separated
    pub remote_path: String,
    /// Base name of the file, used for classification
    pub name: String,
    /// Size in bytes at enumeration time
    pub size_bytes: u64,
}

impl FileDescriptor {
    /// Create a descriptor, taking the base name from the local path
    pub fn new(path: impl Into<PathBuf>, remote_path: impl Into<String>, size_bytes: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            remote_path: remote_path.into(),
            name,
            size_bytes,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }
}

/// Logical base under which remote keys are computed
///
/// Always ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePrefix(String);

impl RemotePrefix {
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self(root)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strip the prefix from a target path; paths outside the prefix are kept as-is
    pub fn object_key(&self, remote_path: &str) -> String {
        remote_path
            .strip_prefix(self.0.as_str())
            .unwrap_or(remote_path)
            .to_string()
    }
}

impl std::fmt::Display for RemotePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A header-style instruction attached to one upload call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOption {
    CacheControl(String),
}

impl UploadOption {
    /// HTTP header name this option maps to
    pub fn header_name(&self) -> &'static str {
        match self {
            UploadOption::CacheControl(_) => "Cache-Control",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            UploadOption::CacheControl(v) => v,
        }
    }
}
