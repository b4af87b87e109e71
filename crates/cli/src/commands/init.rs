//! init command - Write a default configuration file

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use sitepush_core::Config;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Write a default configuration file
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Bucket name to put in the new file
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    path: String,
    created: bool,
}

/// Execute the init command
pub fn execute(args: InitArgs, output_config: OutputConfig, config_path: Option<PathBuf>) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match super::config_manager(config_path) {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to locate configuration: {e}"));
            return ExitCode::GeneralError;
        }
    };
    let path = manager.config_path().display().to_string();

    if manager.config_path().exists() && !args.force {
        formatter.error(&format!(
            "Configuration already exists at {path} (use --force to overwrite)"
        ));
        return ExitCode::UsageError;
    }

    let mut config = Config::default();
    if let Some(bucket) = args.bucket {
        config.bucket.name = bucket;
    }

    if let Err(e) = manager.save(&config) {
        formatter.error(&format!("Failed to write configuration: {e}"));
        return ExitCode::from_error(&e);
    }

    if formatter.is_json() {
        formatter.json(&InitOutput {
            path,
            created: true,
        });
    } else {
        formatter.success(&format!("Configuration written to {path}"));
    }

    ExitCode::Success
}
