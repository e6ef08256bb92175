//! Run configuration
//!
//! A `RunConfig` is produced once at startup and handed to the frame processor,
//! which never mutates it. Initialize mode (`clear_files`) is decided here and
//! nowhere else.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one processing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Recreate every output table with only its header before processing
    #[serde(default = "default_true")]
    pub clear_files: bool,

    /// Directory holding the output tables
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            clear_files: default_true(),
            output_dir: default_output_dir(),
        }
    }
}

impl RunConfig {
    /// Create a run configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable initialize mode
    pub fn with_clear_files(mut self, clear_files: bool) -> Self {
        self.clear_files = clear_files;
        self
    }

    /// Builder method: set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_initialize_in_working_dir() {
        let config = RunConfig::new();
        assert!(config.clear_files);
        assert_eq!(config.output_dir(), Path::new("."));
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new()
            .with_clear_files(false)
            .with_output_dir("/tmp/tables");

        assert!(!config.clear_files);
        assert_eq!(config.output_dir(), Path::new("/tmp/tables"));
    }
}
