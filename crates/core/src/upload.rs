//! Batch upload orchestration
//!
//! Drives one batch of files to a [`StorageBackend`] with a bounded number of
//! calls in flight. A failing file never stops the rest of the batch; every
//! file drawn from the input ends up in exactly one of the two result sets.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::classify::CacheControlConfig;
use crate::error::{Error, UploadError};
use crate::traits::StorageBackend;
use crate::types::{FileDescriptor, RemotePrefix};

/// Default number of simultaneous backend calls
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Receives a notice for every file that reached the backend
pub trait UploadReporter: Send + Sync {
    fn uploaded(&self, key: &str, file: &FileDescriptor);
}

/// Prints one line per uploaded file to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl UploadReporter for ConsoleReporter {
    fn uploaded(&self, key: &str, file: &FileDescriptor) {
        println!("uploaded {key} <- {}", file.path.display());
    }
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Files stored successfully, in completion order
    pub uploaded: Vec<FileDescriptor>,
    /// Files that failed, in completion order
    pub failed: Vec<UploadError>,
}

impl BatchResult {
    /// Failures, or `None` when the whole batch went through
    pub fn errors(&self) -> Option<&[UploadError]> {
        if self.failed.is_empty() {
            None
        } else {
            Some(&self.failed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of files accounted for
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded.iter().map(|f| f.size_bytes).sum()
    }
}

/// Uploads batches of files with a shared concurrency bound
pub struct Uploader {
    backend: Arc<dyn StorageBackend>,
    cache_control: CacheControlConfig,
    max_in_flight: usize,
    reporter: Arc<dyn UploadReporter>,
}

impl Uploader {
    pub fn new(backend: Arc<dyn StorageBackend>, cache_control: CacheControlConfig) -> Self {
        Self {
            backend,
            cache_control,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            reporter: Arc::new(ConsoleReporter),
        }
    }

    /// Maximum simultaneous backend calls (at least 1)
    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn UploadReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn cache_control(&self) -> &CacheControlConfig {
        &self.cache_control
    }

    /// Upload every file yielded by `files`, returning once all calls have completed
    ///
    /// Dispatch starts as soon as the first file arrives. When the bound is
    /// saturated, the stream is not polled until a call finishes.
    pub async fn upload<S>(&self, prefix: &RemotePrefix, files: S) -> BatchResult
    where
        S: Stream<Item = FileDescriptor>,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let uploaded = Arc::new(Mutex::new(Vec::new()));
        let failed = Arc::new(Mutex::new(Vec::new()));
        let mut seen_keys = HashSet::new();
        let mut tasks = JoinSet::new();

        let mut files = std::pin::pin!(files);
        while let Some(file) = files.next().await {
            let key = prefix.object_key(&file.remote_path);
            if !seen_keys.insert(key.clone()) {
                tracing::warn!(key = %key, path = %file.path.display(), "Duplicate remote key in batch");
            }
            let options = self.cache_control.options_for(&file.name);

            // The semaphore is local to this batch and never closed
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                unreachable!("upload semaphore closed");
            };

            let backend = Arc::clone(&self.backend);
            let reporter = Arc::clone(&self.reporter);
            let uploaded = Arc::clone(&uploaded);
            let failed = Arc::clone(&failed);

            tasks.spawn(async move {
                tracing::debug!(key = %key, path = %file.path.display(), "Dispatching upload");

                let outcome =
                    AssertUnwindSafe(backend.put_object_from_file(&key, &file.path, &options))
                        .catch_unwind()
                        .await;
                drop(permit);

                let result = outcome.unwrap_or_else(|_| {
                    tracing::error!(key = %key, "Storage backend panicked during upload");
                    Err(Error::General("storage backend panicked".to_string()))
                });

                match result {
                    Ok(()) => {
                        let reported = std::panic::catch_unwind(AssertUnwindSafe(|| {
                            reporter.uploaded(&key, &file)
                        }));
                        if reported.is_err() {
                            tracing::warn!(key = %key, "Upload reporter panicked");
                        }
                        uploaded.lock().await.push(file);
                    }
                    Err(e) => {
                        tracing::debug!(key = %key, error = %e, "Upload failed");
                        failed.lock().await.push(UploadError::new(key, file, e));
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Upload task did not complete");
            }
        }

        let uploaded = std::mem::take(&mut *uploaded.lock().await);
        let failed = std::mem::take(&mut *failed.lock().await);
        tracing::debug!(
            uploaded = uploaded.len(),
            failed = failed.len(),
            "Batch complete"
        );

        BatchResult { uploaded, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::traits::MockStorageBackend;
    use crate::types::UploadOption;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullReporter;

    impl UploadReporter for NullReporter {
        fn uploaded(&self, _key: &str, _file: &FileDescriptor) {}
    }

    #[derive(Default)]
    struct RecordingReporter {
        keys: std::sync::Mutex<Vec<String>>,
    }

    impl UploadReporter for RecordingReporter {
        fn uploaded(&self, key: &str, _file: &FileDescriptor) {
            self.keys.lock().unwrap().push(key.to_string());
        }
    }

    /// Counts simultaneous calls and fails for a fixed set of keys
    #[derive(Default)]
    struct StubBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_keys: HashSet<String>,
        delay: Duration,
    }

    impl StubBackend {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn failing(keys: &[&str]) -> Self {
            Self {
                fail_keys: keys.iter().map(|k| k.to_string()).collect(),
                delay: Duration::from_millis(1),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl StorageBackend for StubBackend {
        async fn put_object_from_file(
            &self,
            key: &str,
            _local_path: &Path,
            _options: &[UploadOption],
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_keys.contains(key) {
                Err(Error::Network(format!("rejected {key}")))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingReporter;

    impl UploadReporter for PanickingReporter {
        fn uploaded(&self, key: &str, _file: &FileDescriptor) {
            if key == "assets/file1.js" {
                panic!("stdout closed");
            }
        }
    }

    struct PanickingBackend;

    #[async_trait]
    impl StorageBackend for PanickingBackend {
        async fn put_object_from_file(
            &self,
            key: &str,
            _local_path: &Path,
            _options: &[UploadOption],
        ) -> Result<()> {
            if key == "boom.js" {
                panic!("backend bug");
            }
            Ok(())
        }
    }

    fn site_files(n: usize) -> Vec<FileDescriptor> {
        (0..n)
            .map(|i| {
                let remote = format!("site/assets/file{i}.js");
                FileDescriptor::new(remote.clone(), remote, 100)
            })
            .collect()
    }

    fn uploader(backend: Arc<dyn StorageBackend>) -> Uploader {
        Uploader::new(backend, CacheControlConfig::default()).reporter(Arc::new(NullReporter))
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let mut mock = MockStorageBackend::new();
        mock.expect_put_object_from_file().times(0);

        let result = uploader(Arc::new(mock))
            .upload(&RemotePrefix::new("site"), futures::stream::empty())
            .await;

        assert!(result.uploaded.is_empty());
        assert!(result.errors().is_none());
        assert!(result.is_success());
        assert_eq!(result.total(), 0);
    }

    #[tokio::test]
    async fn test_key_and_cache_control_passed_to_backend() {
        let mut mock = MockStorageBackend::new();
        mock.expect_put_object_from_file()
            .withf(|key, path, options| {
                key == "assets/app.js"
                    && path == Path::new("site/assets/app.js")
                    && options.first()
                        == Some(&UploadOption::CacheControl("max-age=2592000".to_string()))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_put_object_from_file()
            .withf(|key, _, options| {
                key == "index.html"
                    && options.first() == Some(&UploadOption::CacheControl("no-cache".to_string()))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let files = vec![
            FileDescriptor::new("site/assets/app.js", "site/assets/app.js", 10),
            FileDescriptor::new("site/index.html", "site/index.html", 20),
        ];
        let result = uploader(Arc::new(mock))
            .upload(&RemotePrefix::new("site"), futures::stream::iter(files))
            .await;

        assert_eq!(result.uploaded.len(), 2);
        assert_eq!(result.uploaded_bytes(), 30);
        assert!(result.errors().is_none());
    }

    #[tokio::test]
    async fn test_every_file_accounted_once() {
        let backend = Arc::new(StubBackend::failing(&[
            "assets/file3.js",
            "assets/file17.js",
            "assets/file42.js",
        ]));
        let files = site_files(50);

        let result = uploader(backend.clone())
            .upload(&RemotePrefix::new("site"), futures::stream::iter(files.clone()))
            .await;

        assert_eq!(result.total(), 50);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 50);

        let uploaded: HashSet<_> = result.uploaded.iter().map(|f| f.remote_path.clone()).collect();
        let failed: HashSet<_> = result.failed.iter().map(|e| e.file.remote_path.clone()).collect();
        assert!(uploaded.is_disjoint(&failed));
        for file in &files {
            assert!(uploaded.contains(&file.remote_path) || failed.contains(&file.remote_path));
        }
    }

    #[tokio::test]
    async fn test_failures_isolated_to_failing_keys() {
        let failing = ["assets/file1.js", "assets/file4.js"];
        let backend = Arc::new(StubBackend::failing(&failing));

        let result = uploader(backend)
            .upload(&RemotePrefix::new("site/"), futures::stream::iter(site_files(8)))
            .await;

        let mut failed_keys: Vec<_> = result.failed.iter().map(|e| e.key.as_str()).collect();
        failed_keys.sort();
        assert_eq!(failed_keys, failing);
        assert_eq!(result.uploaded.len(), 6);
        assert_eq!(result.errors().map(|e| e.len()), Some(2));
        assert!(matches!(result.failed[0].source, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_default_bound_never_exceeded() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(5)));

        let result = uploader(backend.clone())
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(100)))
            .await;

        assert_eq!(result.uploaded.len(), 100);
        let peak = backend.peak.load(Ordering::SeqCst);
        assert!(peak <= DEFAULT_MAX_IN_FLIGHT, "peak {peak} exceeded bound");
        assert!(peak > 1, "uploads never overlapped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_custom_bound_on_multi_thread_runtime() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(2)));

        let result = uploader(backend.clone())
            .max_in_flight(3)
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(40)))
            .await;

        assert_eq!(result.total(), 40);
        assert!(backend.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_bound_clamped_to_one() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(1)));

        let result = uploader(backend.clone())
            .max_in_flight(0)
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(5)))
            .await;

        assert_eq!(result.uploaded.len(), 5);
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trickling_input_is_fully_drained() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(1)));
        let files = futures::stream::iter(site_files(6)).then(|f| async move {
            tokio::time::sleep(Duration::from_millis(3)).await;
            f
        });

        let result = uploader(backend.clone())
            .upload(&RemotePrefix::new("site"), files)
            .await;

        assert_eq!(result.uploaded.len(), 6);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_backend_panic_recorded_as_failure() {
        let files = vec![
            FileDescriptor::new("site/boom.js", "site/boom.js", 1),
            FileDescriptor::new("site/ok.js", "site/ok.js", 1),
        ];

        let result = uploader(Arc::new(PanickingBackend))
            .upload(&RemotePrefix::new("site"), futures::stream::iter(files))
            .await;

        assert_eq!(result.total(), 2);
        assert_eq!(result.uploaded.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].key, "boom.js");
    }

    #[tokio::test]
    async fn test_reporter_sees_only_successes() {
        let backend = Arc::new(StubBackend::failing(&["assets/file0.js"]));
        let reporter = Arc::new(RecordingReporter::default());

        let result = Uploader::new(backend, CacheControlConfig::default())
            .reporter(reporter.clone())
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(3)))
            .await;

        let mut keys = reporter.keys.lock().unwrap().clone();
        keys.sort();
        assert_eq!(keys, vec!["assets/file1.js", "assets/file2.js"]);
        assert_eq!(result.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_keys_both_dispatched() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(1)));
        let files = vec![
            FileDescriptor::new("a/index.html", "site/index.html", 1),
            FileDescriptor::new("b/index.html", "site/index.html", 1),
        ];

        let result = uploader(backend.clone())
            .upload(&RemotePrefix::new("site"), futures::stream::iter(files))
            .await;

        assert_eq!(result.uploaded.len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reporter_panic_keeps_file_uploaded() {
        let backend = Arc::new(StubBackend::with_delay(Duration::from_millis(1)));

        let result = Uploader::new(backend, CacheControlConfig::default())
            .reporter(Arc::new(PanickingReporter))
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(3)))
            .await;

        assert_eq!(result.total(), 3);
        assert_eq!(result.uploaded.len(), 3);
        assert!(result.errors().is_none());
    }

    #[tokio::test]
    async fn test_permits_released_when_most_uploads_fail() {
        let failing: Vec<String> = (0..50)
            .filter(|i| i % 5 != 0)
            .map(|i| format!("assets/file{i}.js"))
            .collect();
        let failing: Vec<&str> = failing.iter().map(String::as_str).collect();
        let backend = Arc::new(StubBackend::failing(&failing));

        let result = uploader(backend.clone())
            .max_in_flight(2)
            .upload(&RemotePrefix::new("site"), futures::stream::iter(site_files(50)))
            .await;

        assert_eq!(result.total(), 50);
        assert_eq!(result.failed.len(), 40);
        assert_eq!(result.uploaded.len(), 10);
        assert!(backend.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    }
}
