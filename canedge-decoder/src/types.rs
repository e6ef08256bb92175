//! Core types for the CANedge signal decoder
//!
//! This module defines the frame type produced by log readers, the values and rows
//! produced by the decode rules, and the error type shared by the whole library.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::bits::BitRangeError;

/// Timestamp type used when rendering frame times for humans
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Raw CAN frame as yielded by a log reader
///
/// Frames are immutable once read and are consumed once by the frame processor.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Seconds since epoch, with fractional part
    pub timestamp: f64,
    /// CAN channel number (e.g., 0 for can0)
    pub channel: u8,
    /// CAN arbitration ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Payload bytes exactly as transmitted
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
}

impl Frame {
    /// Create a frame on channel 0; the ID is marked extended when it does not fit in 11 bits
    pub fn new(timestamp: f64, can_id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            channel: 0,
            can_id,
            data: data.into(),
            is_extended: can_id > 0x7FF,
        }
    }

    /// Canonical registry key for this frame's arbitration ID
    pub fn id_key(&self) -> IdKey {
        IdKey::from_can_id(self.can_id)
    }

    /// Convert the fractional timestamp to DateTime<Utc>
    pub fn datetime(&self) -> Option<Timestamp> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let secs = self.timestamp.floor();
        let nsecs = ((self.timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nsecs)
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Payload as lowercase hex, as echoed in trace output
    pub fn data_hex(&self) -> String {
        self.data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Canonical string form of an arbitration ID: `0x` followed by lowercase hex digits
///
/// Keys carry no zero padding, so CAN ID `0x01000001` is keyed as `0x1000001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IdKey(String);

impl IdKey {
    pub fn from_can_id(can_id: u32) -> Self {
        Self(format!("{:#x}", can_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for IdKey {
    fn from(can_id: u32) -> Self {
        Self::from_can_id(can_id)
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single decoded field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Zero-extended unsigned integer (flags are 0/1)
    Unsigned(u64),
    /// IEEE-754 single-precision value
    Float(f32),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Float(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Unsigned(_) => None,
        }
    }
}

/// One output row: the frame timestamp plus the decoded fields in column order
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub timestamp: f64,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl DecodedRow {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            fields: Vec::new(),
        }
    }

    /// Builder method: append a field
    pub fn with(mut self, name: &'static str, value: FieldValue) -> Self {
        self.fields.push((name, value));
        self
    }

    /// Look up a field by column name
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// Column names in row order (timestamp excluded)
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }
}

/// Errors that can occur while decoding a log into tables
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse log file: {0}")]
    LogParse(String),

    #[error("Bit range error: {0}")]
    Range(#[from] BitRangeError),

    #[error("Row does not match columns of table '{table}': expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Table not open: {0}")]
    TableNotOpen(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
