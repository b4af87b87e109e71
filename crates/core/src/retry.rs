//! Caller-side retry of failed uploads with exponential backoff and jitter
//!
//! The uploader never retries on its own. This module re-runs the transient
//! failures of a finished batch as fresh, smaller batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, UploadError};
use crate::types::RemotePrefix;
use crate::upload::{BatchResult, Uploader};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per file, the first upload included
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryBuilder::new().build()
    }
}

/// Re-upload the retryable failures of `result` until they succeed or attempts run out
///
/// The returned result accounts for every file of the original batch exactly once.
pub async fn retry_failed(
    uploader: &Uploader,
    prefix: &RemotePrefix,
    mut result: BatchResult,
    config: &RetryConfig,
) -> BatchResult {
    let mut attempt = 1;

    while attempt < config.max_attempts {
        let (retryable, permanent): (Vec<UploadError>, Vec<UploadError>) = result
            .failed
            .into_iter()
            .partition(|e| is_retryable_error(&e.source));
        result.failed = permanent;

        if retryable.is_empty() {
            break;
        }

        let backoff = calculate_backoff(config, attempt);
        tracing::warn!(
            attempt = attempt,
            files = retryable.len(),
            backoff_ms = backoff.as_millis(),
            "Retrying failed uploads after transient errors"
        );
        tokio::time::sleep(backoff).await;

        let files = retryable.into_iter().map(|e| e.file);
        let retried = uploader.upload(prefix, futures::stream::iter(files)).await;
        result.uploaded.extend(retried.uploaded);
        result.failed.extend(retried.failed);

        attempt += 1;
    }

    result
}

/// Calculate backoff duration with jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    // Exponential backoff: initial * 2^(attempt-1)
    let base_ms = config
        .initial_backoff_ms
        .saturating_mul(1u64 << (attempt.max(1) - 1).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    let jitter_ms = rand_jitter(capped_ms);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

/// Generate pseudo-random jitter without external RNG dependency
fn rand_jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Check if an upload failure is transient
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Network(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("timeout")
                || msg_lower.contains("connection reset")
                || msg_lower.contains("connection refused")
                || msg_lower.contains("dispatch")
                || msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("too many requests")
                || msg_lower.contains("429")
                || msg_lower.contains("slow down")
        }
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        Error::Auth(_) | Error::NotFound(_) | Error::InvalidPath(_) | Error::Config(_) => false,
        Error::General(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("timeout") || msg_lower.contains("temporary")
        }
    }
}

/// Retry configuration builder
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 10000,
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Attempts after the first upload
    pub fn retries(self, n: u32) -> Self {
        self.max_attempts(n.saturating_add(1))
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_backoff_ms: self.initial_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
