//! MF4 (ASAM MDF4) log reader
//!
//! CANedge loggers record bus traffic as MDF4 bus-logging channel groups. The
//! container itself is parsed by `mdf4-rs`; this reader only turns the decoded
//! CAN data-frame channels back into [`Frame`]s.
//!
//! Three channel layouts are recognized per channel group, each next to a
//! `Timestamp` channel:
//!
//! - `CAN_DataFrame.ID`, `.IDE`, `.DataLength`, `.DataBytes` sub-channels (CANedge)
//! - a packed `CAN_DataFrame` byte array: ID (4 bytes LE, bit 31 = IDE), DLC, data
//! - `CAN_ID`, `DLC` and `Data_<n>` columns
//!
//! Other groups (error frames, remote frames, other buses) are skipped. Frames
//! from all groups are merged in timestamp order and shifted by the file start
//! time, so timestamps are seconds since epoch as with every other reader.

use mdf4_rs::{Channel, ChannelGroup, DecodedValue, MDF};
use std::collections::HashMap;
use std::path::Path;

use super::LogReader;
use crate::types::{DecoderError, Frame, Result};

const EXTENDED_FLAG: u32 = 0x8000_0000;
const ID_MASK: u32 = 0x1FFF_FFFF;

type Samples = Vec<Option<DecodedValue>>;

/// Iterator over CAN frames from an MF4 file
pub struct Mf4Reader {
    frames: std::vec::IntoIter<Frame>,
}

impl Mf4Reader {
    /// Frames not yet yielded
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LogReader for Mf4Reader {
    fn open(path: &Path) -> Result<Self> {
        log::info!("Opening MF4 log: {:?}", path);

        let path_str = path.to_str().ok_or_else(|| {
            DecoderError::LogParse(format!("Invalid UTF-8 in path: {:?}", path))
        })?;
        let mdf = MDF::from_file(path_str).map_err(|e| {
            DecoderError::LogParse(format!("Failed to open MF4 file {:?}: {}", path, e))
        })?;

        // Header start time is in nanoseconds since epoch
        let start = mdf.raw().header.start_time_ns as f64 / 1e9;

        let mut frames = Vec::new();
        for (index, group) in mdf.channel_groups().iter().enumerate() {
            let name = group.name().map_err(mdf_error)?.unwrap_or_default();
            match read_group(group, start)? {
                Some(group_frames) => {
                    log::debug!(
                        "Channel group {} ({:?}): {} CAN frames",
                        index,
                        name,
                        group_frames.len()
                    );
                    frames.extend(group_frames);
                }
                None => log::debug!("Skipping channel group {} ({:?})", index, name),
            }
        }

        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        log::info!("Read {} CAN frames from MF4 log", frames.len());

        Ok(Self {
            frames: frames.into_iter(),
        })
    }
}

impl Iterator for Mf4Reader {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.next().map(Ok)
    }
}

fn mdf_error(e: mdf4_rs::Error) -> DecoderError {
    DecoderError::LogParse(format!("MF4 read error: {}", e))
}

/// Channels of one group, keyed by name
struct GroupChannels<'a> {
    channels: HashMap<String, Channel<'a>>,
}

impl<'a> GroupChannels<'a> {
    fn new(group: &ChannelGroup<'a>) -> Result<Self> {
        let mut channels = HashMap::new();
        for channel in group.channels() {
            if let Some(name) = channel.name().map_err(mdf_error)? {
                channels.insert(name, channel);
            }
        }
        Ok(Self { channels })
    }

    fn has(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    fn samples(&self, name: &str) -> Result<Option<Samples>> {
        self.channels
            .get(name)
            .map(|channel| channel.values().map_err(mdf_error))
            .transpose()
    }

    fn required(&self, name: &str) -> Result<Samples> {
        self.samples(name)?
            .ok_or_else(|| DecoderError::LogParse(format!("MF4 channel {:?} missing", name)))
    }

    fn unit(&self, name: &str) -> Result<Option<String>> {
        match self.channels.get(name) {
            Some(channel) => channel.unit().map_err(mdf_error),
            None => Ok(None),
        }
    }
}

/// Decode the CAN frames of one channel group, `None` when it holds no CAN data frames
fn read_group(group: &ChannelGroup<'_>, start: f64) -> Result<Option<Vec<Frame>>> {
    let channels = GroupChannels::new(group)?;
    if !channels.has("Timestamp") {
        return Ok(None);
    }

    let scale = time_scale(channels.unit("Timestamp")?.as_deref());
    let timestamps = channels.required("Timestamp")?;
    let timestamp = |i: usize| seconds(timestamps.get(i), scale).map(|t| start + t);

    let mut frames = Vec::with_capacity(timestamps.len());
    let mut invalid = 0usize;

    if channels.has("CAN_DataFrame.ID") && channels.has("CAN_DataFrame.DataBytes") {
        let ids = channels.required("CAN_DataFrame.ID")?;
        let ide = channels.samples("CAN_DataFrame.IDE")?;
        let lengths = channels.samples("CAN_DataFrame.DataLength")?;
        let payloads = channels.required("CAN_DataFrame.DataBytes")?;
        let buses = channels.samples("CAN_DataFrame.BusChannel")?;

        for i in 0..timestamps.len() {
            let (Some(ts), Some(raw_id), Some(payload)) = (
                timestamp(i),
                unsigned(ids.get(i)),
                bytes(payloads.get(i)),
            ) else {
                invalid += 1;
                continue;
            };
            let flagged = ide.as_ref().and_then(|s| unsigned(s.get(i))) == Some(1);
            let len = lengths
                .as_ref()
                .and_then(|s| unsigned(s.get(i)))
                .map_or(payload.len(), |n| (n as usize).min(payload.len()));
            let channel = buses.as_ref().and_then(|s| unsigned(s.get(i))).unwrap_or(0);
            frames.push(frame(ts, channel, raw_id as u32, flagged, &payload[..len]));
        }
    } else if channels.has("CAN_DataFrame") {
        let packed = channels.required("CAN_DataFrame")?;

        for i in 0..timestamps.len() {
            let (Some(ts), Some(record)) = (timestamp(i), bytes(packed.get(i))) else {
                invalid += 1;
                continue;
            };
            let Some((header, payload)) = record.split_first_chunk::<5>() else {
                invalid += 1;
                continue;
            };
            let raw_id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let len = dlc_to_len(header[4]).min(payload.len());
            frames.push(frame(ts, 0, raw_id, false, &payload[..len]));
        }
    } else if channels.has("CAN_ID") && channels.has("Data_0") {
        let ids = channels.required("CAN_ID")?;
        let dlcs = channels.samples("DLC")?;
        let mut data_columns = Vec::new();
        while let Some(column) = channels.samples(&format!("Data_{}", data_columns.len()))? {
            data_columns.push(column);
        }

        for i in 0..timestamps.len() {
            let (Some(ts), Some(raw_id)) = (timestamp(i), unsigned(ids.get(i))) else {
                invalid += 1;
                continue;
            };
            let len = dlcs
                .as_ref()
                .and_then(|s| unsigned(s.get(i)))
                .map_or(data_columns.len(), |dlc| dlc_to_len(dlc as u8))
                .min(data_columns.len());
            let data: Option<Vec<u8>> = data_columns[..len]
                .iter()
                .map(|column| unsigned(column.get(i)).map(|b| b as u8))
                .collect();
            let Some(data) = data else {
                invalid += 1;
                continue;
            };
            frames.push(frame(ts, 0, raw_id as u32, false, &data));
        }
    } else {
        return Ok(None);
    }

    if invalid > 0 {
        log::warn!(
            "Skipped {} invalid records in channel group {:?}",
            invalid,
            group.name().ok().flatten().unwrap_or_default()
        );
    }
    Ok(Some(frames))
}

fn frame(timestamp: f64, channel: u64, raw_id: u32, flagged: bool, data: &[u8]) -> Frame {
    let can_id = raw_id & ID_MASK;
    Frame {
        timestamp,
        channel: u8::try_from(channel).unwrap_or(u8::MAX),
        can_id,
        data: data.to_vec(),
        is_extended: flagged || raw_id & EXTENDED_FLAG != 0 || can_id > 0x7FF,
    }
}

fn unsigned(sample: Option<&Option<DecodedValue>>) -> Option<u64> {
    match sample? {
        Some(DecodedValue::UnsignedInteger(v)) => Some(*v),
        Some(DecodedValue::SignedInteger(v)) => u64::try_from(*v).ok(),
        _ => None,
    }
}

fn bytes(sample: Option<&Option<DecodedValue>>) -> Option<&[u8]> {
    match sample? {
        Some(DecodedValue::ByteArray(b)) => Some(b.as_slice()),
        _ => None,
    }
}

fn seconds(sample: Option<&Option<DecodedValue>>, scale: f64) -> Option<f64> {
    match sample? {
        Some(DecodedValue::Float(t)) => Some(*t * scale),
        Some(DecodedValue::UnsignedInteger(t)) => Some(*t as f64 * scale),
        Some(DecodedValue::SignedInteger(t)) => Some(*t as f64 * scale),
        _ => None,
    }
}

/// Seconds per timestamp unit; unitless timestamps are seconds
fn time_scale(unit: Option<&str>) -> f64 {
    match unit {
        Some("ms") => 1e-3,
        Some("us") | Some("µs") => 1e-6,
        Some("ns") => 1e-9,
        _ => 1.0,
    }
}

/// Payload length for a CAN / CAN-FD DLC
fn dlc_to_len(dlc: u8) -> usize {
    match dlc {
        0..=8 => dlc as usize,
        9 => 12,
        10 => 16,
        11 => 20,
        12 => 24,
        13 => 32,
        14 => 48,
        _ => 64,
    }
}
