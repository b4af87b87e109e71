//! Storage backend abstraction
//!
//! The uploader depends only on this narrow capability, so it can be tested
//! with stubs and backed by any object store SDK.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::UploadOption;

/// Capability to store a local file under a remote key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload the file at `local_path` to `key`, applying `options` as object headers
    async fn put_object_from_file(
        &self,
        key: &str,
        local_path: &Path,
        options: &[UploadOption],
    ) -> Result<()>;
}
