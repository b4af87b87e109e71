//! Local file enumeration
//!
//! Walks a folder on a blocking task and hands descriptors to the uploader
//! through a bounded channel, so uploads start before the walk finishes.

use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{FileDescriptor, RemotePrefix};

const CHANNEL_CAPACITY: usize = 256;

/// Options for walking a local folder
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Patterns matched against the path relative to the root
    pub excludes: Vec<glob::Pattern>,
}

impl WalkOptions {
    /// Compile exclude globs
    pub fn with_excludes<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let excludes = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                glob::Pattern::new(p)
                    .map_err(|e| Error::Config(format!("Invalid exclude pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { excludes })
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes.iter().any(|p| p.matches_path(relative))
    }
}

/// Files being enumerated under a root folder
pub struct LocalFiles {
    prefix: RemotePrefix,
    rx: mpsc::Receiver<FileDescriptor>,
    handle: JoinHandle<Result<usize>>,
}

impl LocalFiles {
    /// Prefix that strips the root back off every target path
    pub fn prefix(&self) -> &RemotePrefix {
        &self.prefix
    }

    /// Split into the descriptor stream and the walker handle
    ///
    /// The handle resolves to the number of files yielded once the walk is done.
    pub fn into_parts(self) -> (impl Stream<Item = FileDescriptor>, WalkHandle) {
        let stream = futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|file| (file, rx))
        });
        (stream, WalkHandle(self.handle))
    }
}

/// Completion handle of a walk
pub struct WalkHandle(JoinHandle<Result<usize>>);

impl WalkHandle {
    pub async fn finish(self) -> Result<usize> {
        self.0
            .await
            .map_err(|e| Error::General(format!("File walker task failed: {e}")))?
    }
}

/// Start walking `root`
///
/// The target path of each file is `root` (with `/` separators) joined with the
/// path relative to it, so [`LocalFiles::prefix`] strips back to the relative key.
pub fn walk(root: impl Into<PathBuf>, options: WalkOptions) -> Result<LocalFiles> {
    let root = root.into();
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let remote_root = to_slash(&root).trim_end_matches('/').to_string();
    let prefix = RemotePrefix::new(remote_root.clone());

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle =
        tokio::task::spawn_blocking(move || walk_blocking(&root, &remote_root, &options, &tx));

    Ok(LocalFiles { prefix, rx, handle })
}

fn walk_blocking(
    root: &Path,
    remote_root: &str,
    options: &WalkOptions,
    tx: &mpsc::Sender<FileDescriptor>,
) -> Result<usize> {
    let mut count = 0;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| match e.path().strip_prefix(root) {
            Ok(relative) if e.depth() > 0 => !options.is_excluded(relative),
            _ => true,
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(Error::Io(err.into())),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable path");
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_dir() {
            continue;
        }
        if !entry.file_type().is_file() {
            tracing::warn!(path = %path.display(), "Skipping non-regular file");
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read metadata");
                continue;
            }
        };

        let remote_path = if remote_root.is_empty() {
            to_slash(relative)
        } else {
            format!("{remote_root}/{}", to_slash(relative))
        };
        let file = FileDescriptor::new(path.to_path_buf(), remote_path, size);

        if tx.blocking_send(file).is_err() {
            tracing::debug!("File consumer went away, stopping walk");
            return Ok(count);
        }
        count += 1;
    }

    Ok(count)
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}
