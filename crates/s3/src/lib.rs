//! sitepush-s3: S3 SDK adapter for sitepush
//!
//! This crate implements the `StorageBackend` trait from sitepush-core
//! using the aws-sdk-s3 crate.

mod client;

pub use client::S3Client;
