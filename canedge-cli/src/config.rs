//! Configuration loading and merging
//!
//! Settings come from an optional TOML file and are overridden by command-line
//! flags. `configure` resolves both into an immutable [`Settings`] before any
//! table is touched.

use anyhow::{Context, Result};
use canedge_decoder::RunConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory for the CSV tables
    pub dir: Option<PathBuf>,
    /// Recreate tables with only a header before processing
    pub clear_files: Option<bool>,
    /// Write a JSON run report to this path
    pub report: Option<PathBuf>,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub append: bool,
    pub report: Option<PathBuf>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub run: RunConfig,
    pub report: Option<PathBuf>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Merge file configuration and command-line overrides
pub fn configure(file: AppConfig, overrides: Overrides) -> Settings {
    let mut run = RunConfig::new();

    if let Some(dir) = overrides.output_dir.or(file.output.dir) {
        run = run.with_output_dir(dir);
    }
    if let Some(clear_files) = file.output.clear_files {
        run = run.with_clear_files(clear_files);
    }
    if overrides.append {
        run = run.with_clear_files(false);
    }

    Settings {
        run,
        report: overrides.report.or(file.output.report),
    }
}
