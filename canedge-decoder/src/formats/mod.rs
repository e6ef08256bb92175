//! Log file readers
//!
//! Readers turn a recorded log into an ordered stream of [`Frame`]s. The frame
//! processor only sees the stream; exhaustion ends the run and any `Err` item
//! aborts it.

use crate::types::{DecoderError, Frame, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod candump;
pub mod mf4;

pub use candump::CandumpReader;
pub use mf4::Mf4Reader;

/// Common trait for all log readers
pub trait LogReader: Iterator<Item = Result<Frame>> + Sized {
    /// Open a log file and return an iterator over its frames
    fn open(path: &Path) -> Result<Self>;
}

/// Open a log file, selecting the reader from its extension
pub fn open_log(path: &Path) -> Result<Box<dyn Iterator<Item = Result<Frame>>>> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("mf4") => {
            log::debug!("Detected MF4 log format");
            boxed::<Mf4Reader>(path)
        }
        Some("log") | Some("candump") | Some("txt") => {
            log::debug!("Detected candump log format");
            boxed::<CandumpReader<BufReader<File>>>(path)
        }
        _ => Err(DecoderError::LogParse(format!(
            "Unsupported file format: {:?}",
            extension
        ))),
    }
}

fn boxed<R: LogReader + 'static>(path: &Path) -> Result<Box<dyn Iterator<Item = Result<Frame>>>> {
    Ok(Box::new(R::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_file_format() {
        let result = open_log(Path::new("trace.blf"));
        assert!(matches!(result, Err(DecoderError::LogParse(_))));
    }

    #[test]
    fn test_missing_log_file() {
        let result = open_log(Path::new("nonexistent.log"));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_through_trait() {
        let mut file = tempfile::Builder::new().suffix(".log").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"(1.0) can0 123#0102\n").unwrap();

        let frames: Vec<Frame> = <CandumpReader<BufReader<File>> as LogReader>::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, vec![0x01, 0x02]);
    }

    #[test]
    fn test_mf4_extension_selects_mf4_reader() {
        let mut logger = mdf4_rs::can::RawCanLogger::new().unwrap();
        logger.log(0x0100_0002, 1_000, &[0xCD, 0xCC, 0x4C, 0x3D]);
        let bytes = logger.finalize().unwrap();

        let mut file = tempfile::Builder::new().suffix(".MF4").tempfile().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();

        let frames: Vec<Frame> = open_log(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].can_id, 0x0100_0002);
    }

    #[test]
    fn test_candump_contents_under_mf4_extension_fail() {
        let mut file = tempfile::Builder::new().suffix(".mf4").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"(1.0) can0 123#0102\n").unwrap();
        assert!(matches!(open_log(file.path()), Err(DecoderError::LogParse(_))));
    }
}
