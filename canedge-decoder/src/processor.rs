//! Frame processor
//!
//! Drives one run: tables are prepared when the processor is built, then frames
//! are read, decoded and written strictly in log order.
//!
//! Per-frame problems never abort the run. Unknown IDs and decode failures are
//! collected into the unmatched-ID set and reported at the end. Table IO errors
//! and reader errors are fatal.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bits::BitBuffer;
use crate::config::RunConfig;
use crate::registry::{DecoderRegistry, Dispatch};
use crate::table::TableWriter;
use crate::types::{Frame, IdKey, Result};

/// Processing phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Registry built, tables prepared
    Idle,
    /// Pulling the next frame from the reader
    Reading,
    /// A rule matched the current frame
    Decoding,
    /// No rule for the current frame
    Skipping,
    /// Reader exhausted
    Done,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Frames read from the log
    pub frames: usize,
    /// Rows appended across all tables
    pub rows_written: usize,
    /// Rows appended per table
    pub rows_per_table: BTreeMap<String, usize>,
    /// Frames whose ID had no decode rule
    pub unknown_frames: usize,
    /// Frames whose decode rule failed
    pub decode_errors: usize,
    /// Sorted IDs that produced no row (unknown or failed)
    pub unmatched_ids: Vec<IdKey>,
    /// Sorted IDs whose decode rule failed at least once
    pub decode_failures: Vec<IdKey>,
}

impl RunSummary {
    /// Human-readable summary line for the end of a run
    pub fn summary_line(&self) -> String {
        if self.unmatched_ids.is_empty() {
            "All CAN IDs matched a decoder".to_string()
        } else {
            let ids: Vec<&str> = self.unmatched_ids.iter().map(IdKey::as_str).collect();
            format!("No matching decoder for CAN IDs: [{}]", ids.join(", "))
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames read:    {}", self.frames)?;
        writeln!(f, "Rows written:   {}", self.rows_written)?;
        for (table, rows) in &self.rows_per_table {
            writeln!(f, "  {:<20} {}", table, rows)?;
        }
        writeln!(f, "Unknown frames: {}", self.unknown_frames)?;
        writeln!(f, "Decode errors:  {}", self.decode_errors)?;
        write!(f, "{}", self.summary_line())
    }
}

/// Sequential frame processor for one run
pub struct FrameProcessor {
    registry: DecoderRegistry,
    config: RunConfig,
    tables: TableWriter,
    state: ProcessorState,
    unmatched: BTreeSet<IdKey>,
    failed: BTreeSet<IdKey>,
    summary: RunSummary,
}

impl FrameProcessor {
    /// Prepare a run: every rule's table is created (initialize mode) or opened for append
    pub fn new(registry: DecoderRegistry, config: RunConfig) -> Result<Self> {
        let mut tables = TableWriter::new(config.output_dir());

        for rule in registry.rules() {
            if config.clear_files {
                tables.init(rule.table, rule.columns)?;
            } else {
                tables.open_append(rule.table, rule.columns)?;
            }
        }

        log::info!(
            "Prepared {} tables in {:?} ({})",
            registry.len(),
            config.output_dir(),
            if config.clear_files { "initialized" } else { "append" }
        );

        Ok(Self {
            registry,
            config,
            tables,
            state: ProcessorState::Idle,
            unmatched: BTreeSet::new(),
            failed: BTreeSet::new(),
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Process every frame from `frames` and return the run summary
    ///
    /// The first `Err` from the reader or from a table write stops the run.
    pub fn process<I>(mut self, frames: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<Frame>>,
    {
        for frame in frames {
            self.transition(ProcessorState::Reading);
            let frame = frame?;
            self.process_frame(&frame)?;
        }
        self.transition(ProcessorState::Done);

        let mut summary = self.summary;
        summary.unmatched_ids = self.unmatched.into_iter().collect();
        summary.decode_failures = self.failed.into_iter().collect();
        summary.rows_per_table = self
            .registry
            .rules()
            .map(|rule| (rule.table.to_string(), self.tables.rows_written(rule.table)))
            .collect();

        log::info!(
            "Processed {} frames: {} rows written, {} unknown, {} decode errors",
            summary.frames,
            summary.rows_written,
            summary.unknown_frames,
            summary.decode_errors
        );
        Ok(summary)
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        self.summary.frames += 1;
        log::trace!(
            "{:.6} {:X} {} ({})",
            frame.timestamp,
            frame.can_id,
            frame.data_hex(),
            frame
                .datetime()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default()
        );

        let bits = BitBuffer::from_bytes(&frame.data);
        let key = frame.id_key();

        match self.registry.dispatch(&key, frame.timestamp, &bits) {
            Dispatch::Decoded { rule, row } => {
                self.state = ProcessorState::Decoding;
                self.tables.append(rule.table, &row)?;
                self.summary.rows_written += 1;
            }
            Dispatch::Failed { rule, error } => {
                self.state = ProcessorState::Decoding;
                log::warn!(
                    "{} decode error in rule '{}' at {:.6} (payload {}): {}",
                    key,
                    rule.name,
                    frame.timestamp,
                    frame.data_hex(),
                    error
                );
                self.summary.decode_errors += 1;
                self.failed.insert(key.clone());
                self.unmatched.insert(key);
            }
            Dispatch::UnknownId => {
                self.state = ProcessorState::Skipping;
                if self.unmatched.insert(key.clone()) {
                    log::debug!("{} has no decode rule", key);
                }
                self.summary.unknown_frames += 1;
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: ProcessorState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
