//! Built-in decode rules
//!
//! One rule per known arbitration ID. Field positions are `(shift, width)` pairs
//! measured from the least-significant bit of the byte-reversed payload, exactly as
//! the device layout documents them. A rule extracts every field before producing
//! its row, so a short payload never yields a partial row.

use crate::bits::{BitBuffer, BitRangeError};
use crate::registry::DecodeRule;
use crate::types::{DecodedRow, FieldValue};

/// System flags (booleans and small unsigned counters)
pub const SYSTEM_FLAGS_ID: u32 = 0x0100_0001;
/// Motor iqRef
pub const IQ_REF_ID: u32 = 0x0100_0002;
/// Test result / user output iq
pub const USER_OUTPUT_ID: u32 = 0x0100_0003;
/// PID iq_ref
pub const PI_IQ_REF_ID: u32 = 0x0100_0004;

const SYSTEM_FLAGS_COLUMNS: &[&str] = &[
    "flagEnableSystem",
    "isOverSpeed",
    "manualOverSpeed",
    "M1_IFB_U_PPB2",
    "tripFaultValue",
    "clutch_status",
    "loading_e",
    "err",
];

/// `(column, shift, width)` for every system flags field
const SYSTEM_FLAGS_LAYOUT: &[(&str, usize, usize)] = &[
    ("flagEnableSystem", 0, 1),
    ("isOverSpeed", 1, 1),
    ("manualOverSpeed", 2, 1),
    ("M1_IFB_U_PPB2", 6, 10),
    ("tripFaultValue", 16, 16),
    ("clutch_status", 32, 3),
    ("loading_e", 40, 3),
    ("err", 48, 8),
];

/// All built-in rules, in arbitration ID order
pub fn builtin_rules() -> Vec<DecodeRule> {
    vec![
        DecodeRule {
            can_id: SYSTEM_FLAGS_ID,
            name: "System Flags",
            table: "can_0x01000001",
            columns: SYSTEM_FLAGS_COLUMNS,
            decode: decode_system_flags,
        },
        DecodeRule {
            can_id: IQ_REF_ID,
            name: "iqRef",
            table: "can_0x01000002",
            columns: &["iqRef"],
            decode: decode_iq_ref,
        },
        DecodeRule {
            can_id: USER_OUTPUT_ID,
            name: "User Output",
            table: "can_0x01000003",
            columns: &["user_output"],
            decode: decode_user_output,
        },
        DecodeRule {
            can_id: PI_IQ_REF_ID,
            name: "PID iqRef",
            table: "can_0x01000004",
            columns: &["piiq_ref"],
            decode: decode_pi_iq_ref,
        },
    ]
}

fn uint(bits: &BitBuffer, shift: usize, width: usize) -> Result<FieldValue, BitRangeError> {
    Ok(FieldValue::Unsigned(bits.field(shift, width)?.as_unsigned()?))
}

fn float32(bits: &BitBuffer, shift: usize) -> Result<FieldValue, BitRangeError> {
    Ok(FieldValue::Float(bits.field(shift, 32)?.as_float32()?))
}

fn decode_system_flags(timestamp: f64, bits: &BitBuffer) -> Result<DecodedRow, BitRangeError> {
    let mut row = DecodedRow::new(timestamp);
    for &(name, shift, width) in SYSTEM_FLAGS_LAYOUT {
        row = row.with(name, uint(bits, shift, width)?);
    }
    Ok(row)
}

fn decode_iq_ref(timestamp: f64, bits: &BitBuffer) -> Result<DecodedRow, BitRangeError> {
    Ok(DecodedRow::new(timestamp).with("iqRef", float32(bits, 0)?))
}

fn decode_user_output(timestamp: f64, bits: &BitBuffer) -> Result<DecodedRow, BitRangeError> {
    Ok(DecodedRow::new(timestamp).with("user_output", float32(bits, 0)?))
}

fn decode_pi_iq_ref(timestamp: f64, bits: &BitBuffer) -> Result<DecodedRow, BitRangeError> {
    Ok(DecodedRow::new(timestamp).with("piiq_ref", float32(bits, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMESTAMP: f64 = 1735009906.3164;

    fn rule(can_id: u32) -> DecodeRule {
        builtin_rules()
            .into_iter()
            .find(|r| r.can_id == can_id)
            .unwrap()
    }

    fn decode(can_id: u32, payload: &[u8]) -> Result<DecodedRow, BitRangeError> {
        (rule(can_id).decode)(TIMESTAMP, &BitBuffer::from_bytes(payload))
    }

    fn uint_of(row: &DecodedRow, name: &str) -> u64 {
        row.get(name).and_then(|v| v.as_u64()).unwrap()
    }

    #[test]
    fn test_system_flags_reference_frame() {
        let row = decode(SYSTEM_FLAGS_ID, &[0x01, 0x35, 0, 0, 0, 0, 0, 0]).unwrap();

        // Reversed payload reads as 0x0000_0000_0000_3501
        assert_eq!(row.timestamp, TIMESTAMP);
        assert_eq!(uint_of(&row, "flagEnableSystem"), 1);
        assert_eq!(uint_of(&row, "isOverSpeed"), 0);
        assert_eq!(uint_of(&row, "manualOverSpeed"), 0);
        assert_eq!(uint_of(&row, "M1_IFB_U_PPB2"), 212);
        assert_eq!(uint_of(&row, "tripFaultValue"), 0);
        assert_eq!(uint_of(&row, "clutch_status"), 0);
        assert_eq!(uint_of(&row, "loading_e"), 0);
        assert_eq!(uint_of(&row, "err"), 0);
    }

    #[test]
    fn test_system_flags_every_field() {
        // value = 0x00AB_0005_0006_BEEF
        let row = decode(
            SYSTEM_FLAGS_ID,
            &[0xEF, 0xBE, 0x06, 0x00, 0x05, 0x00, 0xAB, 0x00],
        )
        .unwrap();

        assert_eq!(uint_of(&row, "flagEnableSystem"), 1);
        assert_eq!(uint_of(&row, "isOverSpeed"), 1);
        assert_eq!(uint_of(&row, "manualOverSpeed"), 1);
        assert_eq!(uint_of(&row, "M1_IFB_U_PPB2"), 0xBEEF >> 6);
        assert_eq!(uint_of(&row, "tripFaultValue"), 0x0006);
        assert_eq!(uint_of(&row, "clutch_status"), 0x5);
        assert_eq!(uint_of(&row, "loading_e"), 0x0);
        assert_eq!(uint_of(&row, "err"), 0xAB);
    }

    #[test]
    fn test_system_flags_masks_field_width() {
        // clutch_status and loading_e only take their low 3 bits
        let row = decode(SYSTEM_FLAGS_ID, &[0, 0, 0, 0, 0xFF, 0xFE, 0, 0]).unwrap();
        assert_eq!(uint_of(&row, "clutch_status"), 7);
        assert_eq!(uint_of(&row, "loading_e"), 6);
        assert_eq!(uint_of(&row, "err"), 0);
    }

    #[test]
    fn test_system_flags_short_payload_fails_whole_frame() {
        let err = decode(SYSTEM_FLAGS_ID, &[0x01, 0x35, 0, 0]).unwrap_err();
        assert!(matches!(err, BitRangeError::OutOfBounds { .. }));
    }

    #[test]
    fn test_float_rules() {
        let row = decode(IQ_REF_ID, &[0xCD, 0xCC, 0x4C, 0x3D]).unwrap();
        assert!((row.get("iqRef").unwrap().as_f32().unwrap() - 0.05).abs() < 1e-7);

        let row = decode(USER_OUTPUT_ID, &[0x0A, 0xD7, 0xA3, 0x3C]).unwrap();
        assert!((row.get("user_output").unwrap().as_f32().unwrap() - 0.02).abs() < 1e-7);

        let row = decode(PI_IQ_REF_ID, &[0xCD, 0xCC, 0x4C, 0x3D]).unwrap();
        assert!((row.get("piiq_ref").unwrap().as_f32().unwrap() - 0.05).abs() < 1e-7);
    }

    #[test]
    fn test_float_rule_reads_low_word_of_long_payload() {
        let row = decode(IQ_REF_ID, &[0xCD, 0xCC, 0x4C, 0x3D, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert!((row.get("iqRef").unwrap().as_f32().unwrap() - 0.05).abs() < 1e-7);
    }

    #[test]
    fn test_float_rule_short_payload_fails() {
        assert!(decode(IQ_REF_ID, &[0xCD, 0xCC]).is_err());
        assert!(decode(PI_IQ_REF_ID, &[]).is_err());
    }

    #[test]
    fn test_rows_match_declared_columns() {
        let payload = [0u8; 8];
        for rule in builtin_rules() {
            let row = (rule.decode)(0.0, &BitBuffer::from_bytes(&payload)).unwrap();
            let columns: Vec<&str> = row.columns().collect();
            assert_eq!(columns, rule.columns, "rule {}", rule.name);
        }
    }

    #[test]
    fn test_table_names_are_unique() {
        let rules = builtin_rules();
        let mut tables: Vec<&str> = rules.iter().map(|r| r.table).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), rules.len());
    }
}
