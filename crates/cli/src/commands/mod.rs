//! Command implementations

pub mod classify;
pub mod init;
pub mod upload;

use std::path::PathBuf;

use clap::Subcommand;
use sitepush_core::{Config, ConfigManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a local folder to the configured bucket
    Upload(upload::UploadArgs),

    /// Show the cache category and Cache-Control value for file names
    Classify(classify::ClassifyArgs),

    /// Write a default configuration file
    Init(init::InitArgs),
}

/// Execute a command
pub async fn execute(
    cmd: Commands,
    output_config: OutputConfig,
    config_path: Option<PathBuf>,
) -> ExitCode {
    match cmd {
        Commands::Upload(args) => upload::execute(args, output_config, config_path).await,
        Commands::Classify(args) => classify::execute(args, output_config, config_path),
        Commands::Init(args) => init::execute(args, output_config, config_path),
    }
}

/// Config manager for an explicit path or the default location
pub(crate) fn config_manager(config_path: Option<PathBuf>) -> sitepush_core::Result<ConfigManager> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    }
}

/// Load the configuration file and apply environment overrides
pub(crate) fn load_config(
    config_path: Option<PathBuf>,
    formatter: &Formatter,
) -> Result<Config, ExitCode> {
    let manager = match config_manager(config_path) {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to locate configuration: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };

    let mut config = match manager.load() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return Err(ExitCode::UsageError);
        }
    };
    config.apply_env();
    Ok(config)
}
