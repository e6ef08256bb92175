//! candump log file reader
//!
//! Reads the text format written by `candump -l`, one frame per line:
//!
//! ```text
//! (1735009906.316400) can0 01000001#0135000000000000
//! (1735009906.316512) can0 123#R
//! (1735009906.317001) can1 01000002##1cdcc4c3d
//! ```
//!
//! - 3 hex digit IDs are standard frames, 8 hex digit IDs are extended frames
//! - `#R` marks a remote frame, which carries no payload
//! - `##` marks a CAN-FD frame; the first nibble after it holds the FD flags
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::types::{DecoderError, Frame, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::LogReader;

/// Iterator over CAN frames from a candump log
pub struct CandumpReader<R> {
    reader: R,
    line: String,
    line_number: usize,
    finished: bool,
}

impl<R: BufRead> CandumpReader<R> {
    /// Read frames from any buffered source
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
            finished: false,
        }
    }
}

impl LogReader for CandumpReader<BufReader<File>> {
    fn open(path: &Path) -> Result<Self> {
        log::info!("Opening candump log: {:?}", path);

        let file = File::open(path).map_err(|e| {
            DecoderError::LogParse(format!("Failed to open log file {:?}: {}", path, e))
        })?;

        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for CandumpReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let parsed = parse_line(line).map_err(|reason| {
                        DecoderError::LogParse(format!(
                            "line {}: {} ({:?})",
                            self.line_number, reason, line
                        ))
                    });
                    if parsed.is_err() {
                        self.finished = true;
                    }
                    return Some(parsed);
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(DecoderError::Io(e)));
                }
            }
        }
        None
    }
}

/// Parse one candump line into a frame
fn parse_line(line: &str) -> std::result::Result<Frame, String> {
    let mut parts = line.split_whitespace();
    let (Some(ts), Some(interface), Some(body), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected '(timestamp) interface id#data'".to_string());
    };

    let timestamp: f64 = ts
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or("timestamp must be wrapped in parentheses")?
        .parse()
        .map_err(|e| format!("invalid timestamp: {}", e))?;

    if !interface.is_ascii() {
        return Err(format!("interface name {:?} is not ASCII", interface));
    }

    let (id_str, data_str) = body.split_once('#').ok_or("missing '#' separator")?;
    let is_extended = match id_str.len() {
        3 => false,
        8 => true,
        n => return Err(format!("CAN ID must have 3 or 8 hex digits, got {}", n)),
    };
    if !is_hex(id_str) {
        return Err(format!("invalid CAN ID {:?}", id_str));
    }
    let can_id = u32::from_str_radix(id_str, 16).map_err(|e| format!("invalid CAN ID: {}", e))?;
    if is_extended && can_id > 0x1FFF_FFFF {
        return Err(format!("extended CAN ID {:#x} exceeds 29 bits", can_id));
    }

    let data = if data_str.starts_with('R') {
        Vec::new()
    } else if let Some(fd) = data_str.strip_prefix('#') {
        // First nibble is the FD flags field
        let (flags, payload) = fd
            .split_at_checked(1)
            .ok_or("CAN-FD frame is missing its flags nibble")?;
        if !is_hex(flags) {
            return Err(format!("invalid CAN-FD flags {:?}", flags));
        }
        parse_hex_bytes(payload)?
    } else {
        parse_hex_bytes(data_str)?
    };

    Ok(Frame {
        timestamp,
        channel: channel_number(interface),
        can_id,
        data,
        is_extended,
    })
}

fn parse_hex_bytes(hex: &str) -> std::result::Result<Vec<u8>, String> {
    let hex = hex.replace('.', "");
    if !is_hex(&hex) {
        return Err(format!("payload {:?} is not hex", hex));
    }
    if hex.len() % 2 != 0 {
        return Err("payload has an odd number of hex digits".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid payload: {}", e))
        })
        .collect()
}

/// `from_str_radix` tolerates a sign prefix, so digits are checked up front
fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Trailing digits of the interface name (`can1` -> 1), 0 when there are none
fn channel_number(interface: &str) -> u8 {
    let digits_at = interface
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(0, |(i, c)| i + c.len_utf8());
    interface[digits_at..].parse().unwrap_or(0)
}
