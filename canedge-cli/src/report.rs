//! Run report output
//!
//! The summary always goes to stdout; a JSON copy is written when requested.

use anyhow::{Context, Result};
use canedge_decoder::RunSummary;
use std::fs;
use std::path::Path;

/// Print the human-readable summary
pub fn print_summary(summary: &RunSummary, quiet: bool) {
    if quiet {
        println!("{}", summary.summary_line());
    } else {
        println!("{}", summary);
    }
}

/// Write the summary as pretty-printed JSON
pub fn write_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
    log::info!("Run report written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use canedge_decoder::IdKey;

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let summary = RunSummary {
            frames: 3,
            rows_written: 1,
            unknown_frames: 2,
            unmatched_ids: vec![IdKey::from_can_id(0x7E8)],
            ..RunSummary::default()
        };
        write_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["frames"], 3);
        assert_eq!(value["unmatched_ids"][0], "0x7e8");
    }
}
