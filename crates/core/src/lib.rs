//! sitepush-core: Core library for the sitepush static site publisher
//!
//! This crate provides:
//! - Content classification into cache-control categories
//! - Concurrent batch upload with a bounded number of in-flight calls
//! - The StorageBackend trait the uploader talks to
//! - Configuration management and local folder enumeration
//! - Caller-side retry of transient upload failures
//!
//! It is independent of any specific object storage SDK.

pub mod classify;
pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;
pub mod upload;
pub mod walk;

pub use classify::{CacheCategory, CacheControlConfig, classify};
pub use config::{BucketConfig, Config, ConfigManager, UploadConfig};
pub use error::{Error, Result, UploadError};
pub use retry::{RetryBuilder, RetryConfig, is_retryable_error, retry_failed};
pub use traits::StorageBackend;
pub use types::{FileDescriptor, RemotePrefix, UploadOption};
pub use upload::{BatchResult, ConsoleReporter, DEFAULT_MAX_IN_FLIGHT, UploadReporter, Uploader};
pub use walk::{LocalFiles, WalkHandle, WalkOptions, walk};
