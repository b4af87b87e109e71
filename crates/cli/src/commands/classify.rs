//! classify command - Show the caching policy each file would get

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use sitepush_core::{CacheCategory, classify};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show the cache category and Cache-Control value for file names
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// File names or paths to classify
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    files: Vec<ClassifyEntry>,
}

#[derive(Debug, Serialize)]
struct ClassifyEntry {
    name: String,
    category: CacheCategory,
    cache_control: String,
}

/// Execute the classify command
pub fn execute(
    args: ClassifyArgs,
    output_config: OutputConfig,
    config_path: Option<PathBuf>,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match super::load_config(config_path, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let files: Vec<ClassifyEntry> = args
        .names
        .into_iter()
        .map(|name| {
            let category = classify(&name);
            let cache_control = config.cache_control.value_for(category).to_string();
            ClassifyEntry {
                name,
                category,
                cache_control,
            }
        })
        .collect();

    if formatter.is_json() {
        formatter.json(&ClassifyOutput { files });
    } else {
        let width = files.iter().map(|f| f.name.len()).max().unwrap_or(0);
        for file in &files {
            formatter.println(&format!(
                "{:<width$}  {}  {}",
                file.name,
                formatter.style_name(&format!("{:<6}", file.category.to_string())),
                file.cache_control,
            ));
        }
    }

    ExitCode::Success
}
