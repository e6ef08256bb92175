//! CANedge Signal Decoder Library
//!
//! Decodes recorded CAN logs into per-signal CSV tables.
//!
//! # Architecture
//!
//! - [`bits::BitBuffer`] reverses a payload's bytes and extracts bit ranges as
//!   unsigned integers or IEEE-754 floats
//! - [`registry::DecoderRegistry`] maps arbitration-ID keys to static decode rules
//! - [`signals`] holds the built-in rules and their bit layouts
//! - [`table::TableWriter`] appends decoded rows to one CSV table per rule
//! - [`processor::FrameProcessor`] runs the read → decode → write loop and collects
//!   IDs that produced no row
//!
//! Log container parsing lives behind [`formats::LogReader`]. Readers for CANedge
//! MF4 logs (via `mdf4-rs`) and candump text logs are included.
//!
//! # Example Usage
//!
//! ```no_run
//! use canedge_decoder::{formats, DecoderRegistry, FrameProcessor, RunConfig};
//! use std::path::Path;
//!
//! let config = RunConfig::new().with_clear_files(true);
//! let processor = FrameProcessor::new(DecoderRegistry::standard(), config).unwrap();
//!
//! let frames = formats::open_log(Path::new("trace.log")).unwrap();
//! let summary = processor.process(frames).unwrap();
//! println!("{}", summary.summary_line());
//! ```

pub mod bits;
pub mod config;
pub mod formats;
pub mod processor;
pub mod registry;
pub mod signals;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use bits::{BitBuffer, BitRangeError};
pub use config::RunConfig;
pub use processor::{FrameProcessor, ProcessorState, RunSummary};
pub use registry::{DecodeRule, DecoderRegistry, Dispatch};
pub use table::TableWriter;
pub use types::{DecodedRow, DecoderError, FieldValue, Frame, IdKey, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
