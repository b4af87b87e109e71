//! upload command - Publish a local folder to the bucket
//!
//! Walks the folder, uploads every file with its cache-control policy, retries
//! transient failures if asked to, and reports what was published.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sitepush_core::{
    BatchResult, Config, FileDescriptor, LocalFiles, RemotePrefix, RetryBuilder, UploadReporter,
    Uploader, retry_failed, walk,
};
use sitepush_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Publish a local folder to the configured bucket
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local folder to publish (defaults to the configured folder)
    pub folder: Option<String>,

    /// Target bucket (overrides the configuration)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Maximum simultaneous uploads
    #[arg(short = 'P', long)]
    pub concurrency: Option<usize>,

    /// Extra attempts for transient failures
    #[arg(long)]
    pub retries: Option<u32>,

    /// Glob pattern to leave out, relative to the folder (repeatable)
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    bucket: String,
    folder: String,
    started_at: String,
    elapsed_ms: u64,
    uploaded: usize,
    failed: usize,
    uploaded_bytes: u64,
    uploaded_size_human: String,
    files: Vec<UploadedEntry>,
    errors: Vec<FailedEntry>,
}

#[derive(Debug, Serialize)]
struct UploadedEntry {
    key: String,
    path: String,
    size_bytes: u64,
}

#[derive(Debug, Serialize)]
struct FailedEntry {
    key: String,
    path: String,
    error: String,
}

/// Prints one line per stored object and advances the spinner
struct CliReporter {
    formatter: Formatter,
    progress: Option<ProgressBar>,
}

impl UploadReporter for CliReporter {
    fn uploaded(&self, key: &str, file: &FileDescriptor) {
        if self.formatter.is_json() {
            return;
        }
        let line = self
            .formatter
            .uploaded_line(key, &file.path.display().to_string());
        match &self.progress {
            Some(pb) => {
                pb.println(line);
                pb.inc(1);
            }
            None => self.formatter.println(&line),
        }
    }
}

/// Execute the upload command
pub async fn execute(
    args: UploadArgs,
    output_config: OutputConfig,
    config_path: Option<PathBuf>,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut config = match super::load_config(config_path, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };
    apply_args(&mut config, &args);

    if let Err(e) = config.validate() {
        formatter.error(&e.to_string());
        return ExitCode::UsageError;
    }

    let client = match S3Client::new(&config.bucket).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::NetworkError;
        }
    };

    match client.bucket_exists().await {
        Ok(true) => {}
        Ok(false) => {
            formatter.error(&format!("Bucket '{}' not found", config.bucket.name));
            return ExitCode::NotFound;
        }
        Err(e) => {
            formatter.error(&format!("Failed to reach bucket '{}': {e}", config.bucket.name));
            return ExitCode::from_error(&e);
        }
    }

    let walk_options = match config.walk_options() {
        Ok(o) => o,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };
    let files = match walk(&config.upload.folder, walk_options) {
        Ok(f) => f,
        Err(e) => {
            formatter.error(&format!("Cannot read folder '{}': {e}", config.upload.folder));
            return ExitCode::from_error(&e);
        }
    };

    let progress = if !args.no_progress && !formatter.is_json() && !formatter.is_quiet() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} uploaded {msg}")
                .expect("Valid template"),
        );
        pb.set_message(format!("to {}", config.bucket.name));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let reporter = Arc::new(CliReporter {
        formatter: formatter.clone(),
        progress: progress.clone(),
    });
    let uploader = Uploader::new(Arc::new(client), config.cache_control.clone())
        .max_in_flight(config.upload.concurrency)
        .reporter(reporter);

    let prefix = files.prefix().clone();
    tracing::debug!(
        folder = %config.upload.folder,
        bucket = %config.bucket.name,
        concurrency = config.upload.concurrency,
        retries = config.upload.retries,
        "Starting upload"
    );
    let started_at = jiff::Timestamp::now();
    let started = Instant::now();
    let (result, walked) = publish(&uploader, files, config.upload.retries).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let output = build_output(&config, &prefix, &result, started_at, elapsed_ms);
    if formatter.is_json() {
        formatter.json(&output);
    } else {
        print_summary(&formatter, &output);
    }

    if let Err(e) = walked {
        formatter.error(&format!("Folder walk did not finish: {e}"));
        return ExitCode::GeneralError;
    }

    if result.is_success() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

fn apply_args(config: &mut Config, args: &UploadArgs) {
    if let Some(folder) = &args.folder {
        config.upload.folder = folder.clone();
    }
    if let Some(bucket) = &args.bucket {
        config.bucket.name = bucket.clone();
    }
    if let Some(n) = args.concurrency {
        config.upload.concurrency = n;
    }
    if let Some(n) = args.retries {
        config.upload.retries = n;
    }
    config.upload.exclude.extend(args.exclude.iter().cloned());
}

/// Upload everything the walker yields, then retry transient failures
async fn publish(
    uploader: &Uploader,
    files: LocalFiles,
    retries: u32,
) -> (BatchResult, sitepush_core::Result<usize>) {
    let prefix = files.prefix().clone();
    let (stream, walk_handle) = files.into_parts();

    let result = uploader.upload(&prefix, stream).await;
    let walked = walk_handle.finish().await;

    let result = if retries > 0 && !result.is_success() {
        let retry = RetryBuilder::new().retries(retries).build();
        retry_failed(uploader, &prefix, result, &retry).await
    } else {
        result
    };

    (result, walked)
}

fn build_output(
    config: &Config,
    prefix: &RemotePrefix,
    result: &BatchResult,
    started_at: jiff::Timestamp,
    elapsed_ms: u64,
) -> UploadOutput {
    let uploaded_bytes = result.uploaded_bytes();

    let mut files: Vec<UploadedEntry> = result
        .uploaded
        .iter()
        .map(|f| UploadedEntry {
            key: prefix.object_key(&f.remote_path),
            path: f.path.display().to_string(),
            size_bytes: f.size_bytes,
        })
        .collect();
    files.sort_by(|a, b| a.key.cmp(&b.key));

    let mut errors: Vec<FailedEntry> = result
        .failed
        .iter()
        .map(|e| FailedEntry {
            key: e.key.clone(),
            path: e.local_path().display().to_string(),
            error: e.source.to_string(),
        })
        .collect();
    errors.sort_by(|a, b| a.key.cmp(&b.key));

    UploadOutput {
        bucket: config.bucket.name.clone(),
        folder: config.upload.folder.clone(),
        started_at: started_at.to_string(),
        elapsed_ms,
        uploaded: files.len(),
        failed: errors.len(),
        uploaded_bytes,
        uploaded_size_human: humansize::format_size(uploaded_bytes, humansize::BINARY),
        files,
        errors,
    }
}

fn print_summary(formatter: &Formatter, output: &UploadOutput) {
    if !output.errors.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Key", "Path", "Error"]);
        for entry in &output.errors {
            table.add_row(vec![&entry.key, &entry.path, &entry.error]);
        }
        formatter.error(&format!("{} file(s) failed to upload:", output.errors.len()));
        eprintln!("{table}");
    }

    let summary = format!(
        "Published {} file(s) ({}) from {} to {} in {:.1}s, {} failed",
        output.uploaded,
        formatter.style_size(&output.uploaded_size_human),
        output.folder,
        formatter.style_name(&output.bucket),
        output.elapsed_ms as f64 / 1000.0,
        output.failed,
    );
    if output.errors.is_empty() {
        formatter.success(&summary);
    } else {
        formatter.warning(&summary);
    }
}
