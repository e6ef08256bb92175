//! Bit-addressable view of a CAN payload
//!
//! The payload's byte order is reversed once, up front, and bits are then addressed
//! MSB-first over the reversed bytes. Every decode rule can then describe a field as
//! a plain (offset, width) pair instead of swapping bytes per field.
//!
//! Two addressing schemes are offered:
//! - [`BitBuffer::slice`] counts from the most-significant end of the reversed buffer
//! - [`BitBuffer::field`] counts from the least-significant end, which is how the
//!   device bit layouts in [`crate::signals`] are written down

use std::fmt;

/// Errors raised when a bit range cannot be extracted or interpreted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitRangeError {
    #[error("bits [{offset}, {offset}+{width}) exceed buffer of {len} bits")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("{width}-bit range does not fit in a u64")]
    TooWide { width: usize },

    #[error("float32 requires exactly 32 bits, range has {width}")]
    NotFloat32 { width: usize },
}

/// Fixed-size bit buffer built from a byte-reversed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    /// Payload bytes, already reversed
    bytes: Vec<u8>,
    /// First addressed bit, MSB-first over `bytes`
    start: usize,
    /// Number of addressed bits
    len: usize,
}

impl BitBuffer {
    /// Build a buffer from payload bytes as transmitted
    ///
    /// Byte 0 of the reversed payload occupies the most-significant position.
    pub fn from_bytes(payload: &[u8]) -> Self {
        let bytes: Vec<u8> = payload.iter().rev().copied().collect();
        let len = bytes.len() * 8;
        Self {
            bytes,
            start: 0,
            len,
        }
    }

    /// Number of addressed bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one bit, counted from the most-significant end
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        let pos = self.start + index;
        Some((self.bytes[pos / 8] >> (7 - pos % 8)) & 0x01 == 1)
    }

    /// Sub-range `[offset, offset + width)` counted from the most-significant end
    ///
    /// Ranges that run past the end fail; the result is never truncated.
    pub fn slice(&self, offset: usize, width: usize) -> Result<BitBuffer, BitRangeError> {
        let end = offset.checked_add(width);
        match end {
            Some(end) if end <= self.len => Ok(Self {
                bytes: self.bytes.clone(),
                start: self.start + offset,
                len: width,
            }),
            _ => Err(BitRangeError::OutOfBounds {
                offset,
                width,
                len: self.len,
            }),
        }
    }

    /// Sub-range of `width` bits whose lowest bit sits `shift` bits above the
    /// least-significant bit of this buffer
    ///
    /// `field(s, w)` selects the same bits as `(value >> s) & ((1 << w) - 1)` on the
    /// whole buffer read as an unsigned integer.
    pub fn field(&self, shift: usize, width: usize) -> Result<BitBuffer, BitRangeError> {
        let offset = shift
            .checked_add(width)
            .and_then(|top| self.len.checked_sub(top))
            .ok_or(BitRangeError::OutOfBounds {
                offset: shift,
                width,
                len: self.len,
            })?;
        self.slice(offset, width)
    }

    /// Interpret the addressed range as a big-endian unsigned integer
    pub fn as_unsigned(&self) -> Result<u64, BitRangeError> {
        if self.len > 64 {
            return Err(BitRangeError::TooWide { width: self.len });
        }

        let mut value: u64 = 0;
        for i in 0..self.len {
            let pos = self.start + i;
            let bit = (self.bytes[pos / 8] >> (7 - pos % 8)) & 0x01;
            value = (value << 1) | bit as u64;
        }
        Ok(value)
    }

    /// Reinterpret exactly 32 addressed bits as an IEEE-754 single-precision float
    pub fn as_float32(&self) -> Result<f32, BitRangeError> {
        if self.len != 32 {
            return Err(BitRangeError::NotFloat32 { width: self.len });
        }
        let raw = self.as_unsigned()? as u32;
        Ok(f32::from_bits(raw))
    }
}

impl fmt::Display for BitBuffer {
    /// Hex for byte-aligned ranges, a bit string otherwise
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start % 8 == 0 && self.len % 8 == 0 {
            let first = self.start / 8;
            for byte in &self.bytes[first..first + self.len / 8] {
                write!(f, "{:02x}", byte)?;
            }
        } else {
            for i in 0..self.len {
                let bit = self.bit(i).unwrap_or(false);
                f.write_str(if bit { "1" } else { "0" })?;
            }
        }
        Ok(())
    }
}
