//! # Telemetry Decoder
//!
//! Turns a validated [`Frame`] into a [`Record`]: one interpreted, classified
//! value per payload or registered offset.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

use super::classifier::{classify, Classification};
use super::profile::{PacketProfile, ProfileVersion};
use super::registry::{Combine, FieldDescriptor, FieldKind, RangeRule};
use super::scanner::Frame;
use crate::error::{EtcError, Result};

/// Display text of fields without a meaning of their own
pub const PLACEHOLDER: &str = "N/A";

/// Raw bytes behind an interpreted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Byte(u8),
    Pair { msb: u8, lsb: u8 },
}

impl RawValue {
    /// Byte the classifier looks at (the MSB of a pair)
    pub fn primary(&self) -> u8 {
        match *self {
            RawValue::Byte(b) => b,
            RawValue::Pair { msb, .. } => msb,
        }
    }

    /// Big-endian 16-bit count (single bytes widen)
    pub fn count(&self) -> u16 {
        match *self {
            RawValue::Byte(b) => b as u16,
            RawValue::Pair { msb, lsb } => u16::from_be_bytes([msb, lsb]),
        }
    }
}

/// One decoded offset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpretedValue {
    pub name: String,
    pub raw: RawValue,
    pub display: String,
    /// Error-mask verdict, present only for bit fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    pub classification: Classification,
}

/// Interpretation of one frame
///
/// A record describes exactly one frame; the next frame's record replaces
/// it, nothing is carried over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub profile_version: ProfileVersion,
    values: BTreeMap<usize, InterpretedValue>,
}

impl Record {
    pub fn get(&self, offset: usize) -> Option<&InterpretedValue> {
        self.values.get(&offset)
    }

    /// Raw byte at `offset` (the MSB for pairs)
    pub fn raw(&self, offset: usize) -> Option<u8> {
        self.get(offset).map(|v| v.raw.primary())
    }

    /// `(offset, value)` pairs in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &InterpretedValue)> {
        self.values.iter().map(|(&offset, value)| (offset, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &InterpretedValue> {
        self.values.values()
    }

    /// Offsets classified out of range
    pub fn out_of_range(&self) -> impl Iterator<Item = (usize, &InterpretedValue)> {
        self.iter()
            .filter(|(_, v)| v.classification == Classification::OutOfRange)
    }

    /// Bit fields whose error mask matched
    pub fn flagged(&self) -> impl Iterator<Item = (usize, &InterpretedValue)> {
        self.iter().filter(|(_, v)| v.is_error == Some(true))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decode `frame` with `profile`
///
/// The frame is consumed; a frame is interpreted exactly once.
///
/// # Errors
///
/// Returns [`EtcError::Frame`] if the frame was produced for another profile
/// or does not have the profile's length.
pub fn decode(profile: &PacketProfile, frame: Frame) -> Result<Record> {
    if frame.profile_version() != profile.version() {
        return Err(EtcError::Frame(format!(
            "frame belongs to profile {}, decoder uses profile {}",
            frame.profile_version(),
            profile.version()
        )));
    }
    decode_bytes(profile, frame.bytes())
}

/// Decode raw frame bytes without the scanner's provenance check
///
/// # Errors
///
/// Returns [`EtcError::Frame`] if `bytes` is not exactly one frame long.
pub fn decode_bytes(profile: &PacketProfile, bytes: &[u8]) -> Result<Record> {
    if bytes.len() != profile.frame_length() {
        return Err(EtcError::Frame(format!(
            "expected {} bytes, got {}",
            profile.frame_length(),
            bytes.len()
        )));
    }

    let registry = profile.registry();
    let offsets: BTreeSet<usize> = profile.payload().chain(registry.offsets()).collect();

    let values = offsets
        .into_iter()
        .map(|offset| {
            let value = match registry.get(offset) {
                Some(field) => interpret(field, bytes),
                None => unregistered(offset, bytes[offset]),
            };
            (offset, value)
        })
        .collect();

    Ok(Record {
        profile_version: profile.version(),
        values,
    })
}

fn interpret(field: &FieldDescriptor, bytes: &[u8]) -> InterpretedValue {
    let byte = bytes[field.offset];

    let (raw, display, is_error) = match field.kind {
        FieldKind::Fixed | FieldKind::RawByte => {
            let display = match &field.calibration {
                Some(cal) if cal.combine == Combine::None => cal.format(byte as u16),
                _ => hex(byte),
            };
            (RawValue::Byte(byte), display, None)
        }
        FieldKind::BitField(mask) => (RawValue::Byte(byte), binary(byte), Some(mask.is_error(byte))),
        FieldKind::CalibratedPair => {
            // Profile validation guarantees the partner and calibration exist.
            let lsb = field
                .pair_partner_offset
                .and_then(|partner| bytes.get(partner).copied())
                .unwrap_or(0);
            let raw = RawValue::Pair { msb: byte, lsb };
            let display = field
                .calibration
                .as_ref()
                .map(|cal| cal.format(raw.count()))
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            (raw, display, None)
        }
        FieldKind::TemperatureDirect => (RawValue::Byte(byte), format!("{} °C", byte), None),
        FieldKind::Reserved => (RawValue::Byte(byte), PLACEHOLDER.to_string(), None),
    };

    let classification = match field.kind {
        FieldKind::TemperatureDirect => Classification::Valid,
        FieldKind::Reserved => Classification::NotApplicable,
        _ => classify(&field.range, raw.primary()),
    };

    InterpretedValue {
        name: field.name.clone(),
        raw,
        display,
        is_error,
        classification,
    }
}

fn unregistered(offset: usize, byte: u8) -> InterpretedValue {
    InterpretedValue {
        name: format!("DATA_{}", offset),
        raw: RawValue::Byte(byte),
        display: hex(byte),
        is_error: None,
        classification: classify(&RangeRule::NotApplicable, byte),
    }
}

fn hex(byte: u8) -> String {
    format!("0x{:02X}", byte)
}

/// `0b` followed by the eight bits, most significant first, space separated
fn binary(byte: u8) -> String {
    let bits: Vec<String> = (0..8)
        .rev()
        .map(|bit| ((byte >> bit) & 1).to_string())
        .collect();
    format!("0b {}", bits.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::checksum::complement_checksum;
    use crate::protocol::profiles::builtin;
    use crate::protocol::scanner::FrameScanner;

    /// Profile B frame with `patch` applied to the payload, checksum fixed up
    fn frame_b(patch: &[(usize, u8)]) -> Vec<u8> {
        let mut bytes = vec![0u8; 133];
        bytes[..4].copy_from_slice(&[0x41, 0x56, 0x85, 0x02]);
        for &(offset, value) in patch {
            bytes[offset] = value;
        }
        bytes[132] = complement_checksum(&bytes[..132]);
        bytes
    }

    fn decode_b(patch: &[(usize, u8)]) -> Record {
        let profile = builtin(ProfileVersion::B).unwrap();
        decode_bytes(&profile, &frame_b(patch)).unwrap()
    }

    #[test]
    fn test_binary_format() {
        assert_eq!(binary(0x00), "0b 0 0 0 0 0 0 0 0");
        assert_eq!(binary(0x81), "0b 1 0 0 0 0 0 0 1");
        assert_eq!(binary(0x05), "0b 0 0 0 0 0 1 0 1");
    }

    #[test]
    fn test_record_covers_payload() {
        let record = decode_b(&[]);
        assert_eq!(record.len(), 132);
        assert!(record.get(132).is_none(), "checksum byte is not payload");
        assert_eq!(record.profile_version, ProfileVersion::B);
    }

    #[test]
    fn test_header_fields_fixed() {
        let record = decode_b(&[]);
        let header = record.get(0).unwrap();
        assert_eq!(header.name, "HEADER_1");
        assert_eq!(header.display, "0x41");
        assert_eq!(header.classification, Classification::Fixed);
    }

    #[test]
    fn test_wrong_length_field_out_of_range() {
        let record = decode_b(&[(2, 0x80)]);
        assert_eq!(record.get(2).unwrap().classification, Classification::OutOfRange);
        assert_eq!(record.out_of_range().count(), 1);
    }

    #[test]
    fn test_calibrated_pair_display() {
        let record = decode_b(&[(26, 0x01), (27, 0x00)]);
        let voltage = record.get(26).unwrap();
        assert_eq!(voltage.name, "LTC4281_CPU_VOLTAGE_1");
        assert_eq!(voltage.raw, RawValue::Pair { msb: 0x01, lsb: 0x00 });
        assert_eq!(voltage.display, "0.065 V");
        assert_eq!(voltage.classification, Classification::Valid);

        let partner = record.get(27).unwrap();
        assert_eq!(partner.display, PLACEHOLDER);
        assert_eq!(partner.classification, Classification::NotApplicable);
    }

    #[test]
    fn test_current_and_power_units() {
        // 0x0FA0 = 4000 counts
        let record = decode_b(&[(69, 0x0F), (70, 0xA0), (77, 0x0F), (78, 0xA0)]);
        assert_eq!(record.get(69).unwrap().display, "5.000 A");
        assert_eq!(record.get(77).unwrap().display, "40.000 W");
    }

    #[test]
    fn test_bit_field_masks() {
        // DISC_IN_STATUS: any set bit is an error
        let record = decode_b(&[(20, 0x01)]);
        assert_eq!(record.get(20).unwrap().is_error, Some(true));
        let record = decode_b(&[(20, 0x00)]);
        assert_eq!(record.get(20).unwrap().is_error, Some(false));

        // UART_STATUS: only bit 0 is an error
        let record = decode_b(&[(11, 0x02)]);
        assert_eq!(record.get(11).unwrap().is_error, Some(false));
        let record = decode_b(&[(11, 0x01)]);
        assert_eq!(record.get(11).unwrap().is_error, Some(true));

        // I2C_ACK_STATUS_5: low six bits
        let record = decode_b(&[(10, 0xC0)]);
        assert_eq!(record.get(10).unwrap().is_error, Some(false));
        assert_eq!(record.get(10).unwrap().display, "0b 1 1 0 0 0 0 0 0");
    }

    #[test]
    fn test_temperature_always_valid() {
        let record = decode_b(&[(79, 0xFF)]);
        let temp = record.get(79).unwrap();
        assert_eq!(temp.display, "255 °C");
        assert_eq!(temp.classification, Classification::Valid);
    }

    #[test]
    fn test_unregistered_offset() {
        let record = decode_b(&[(127, 0x5A)]);
        let value = record.get(127).unwrap();
        assert_eq!(value.name, "DATA_127");
        assert_eq!(value.display, "0x5A");
        assert_eq!(value.classification, Classification::NotApplicable);
    }

    #[test]
    fn test_reserved_placeholder() {
        let record = decode_b(&[(100, 0x33)]);
        let value = record.get(100).unwrap();
        assert_eq!(value.name, "RESERVED");
        assert_eq!(value.display, PLACEHOLDER);
        assert_eq!(value.classification, Classification::NotApplicable);
    }

    #[test]
    fn test_profile_a_record() {
        let profile = builtin(ProfileVersion::A).unwrap();
        let mut bytes = vec![0u8; 133];
        bytes[..4].copy_from_slice(&[0x41, 0x56, 0x85, 0x02]);
        bytes[30] = 0x12; // LTC4281_PMON_VOLTAGE_1
        bytes[132] = complement_checksum(&bytes[..132]);

        let record = decode_bytes(&profile, &bytes).unwrap();
        // preamble + 128 payload bytes
        assert_eq!(record.len(), 132);
        assert_eq!(record.get(4).unwrap().name, "HEADER_1_ECHO");

        let voltage = record.get(30).unwrap();
        assert_eq!(voltage.name, "LTC4281_PMON_VOLTAGE_1");
        assert_eq!(voltage.display, "0x12");
        assert_eq!(voltage.classification, Classification::Valid);
        assert_eq!(voltage.is_error, None);
    }

    #[test]
    fn test_profile_a_preamble_echo() {
        let profile = builtin(ProfileVersion::A).unwrap();
        let mut bytes = vec![0u8; 133];
        bytes[..8].copy_from_slice(&[0x41, 0x56, 0x85, 0x02, 0x41, 0x56, 0x85, 0x02]);
        bytes[132] = complement_checksum(&bytes[..132]);

        let record = decode_bytes(&profile, &bytes).unwrap();
        for offset in 4..8 {
            assert_eq!(record.get(offset).unwrap().classification, Classification::Fixed);
        }

        bytes[4] = 0x00;
        bytes[132] = complement_checksum(&bytes[..132]);
        let record = decode_bytes(&profile, &bytes).unwrap();
        let echo = record.get(4).unwrap();
        assert_eq!(echo.name, "HEADER_1_ECHO");
        assert_eq!(echo.classification, Classification::OutOfRange);
    }

    #[test]
    fn test_decode_consumes_scanner_frame() {
        let profile = builtin(ProfileVersion::B).unwrap();
        let mut scanner = FrameScanner::new(profile.clone());
        let mut frames = scanner.feed(&frame_b(&[(47, 0x30), (48, 0x00)]));
        let frame = frames.pop().unwrap();

        let record = decode(&profile, frame).unwrap();
        // 0x3000 = 12288 counts x 0.254 mV
        assert_eq!(record.get(47).unwrap().display, "3.121 V");
    }

    #[test]
    fn test_decode_rejects_foreign_frame() {
        let a = builtin(ProfileVersion::A).unwrap();
        let b = builtin(ProfileVersion::B).unwrap();
        let mut scanner = FrameScanner::new(a);
        let frame = scanner.feed(&frame_b(&[])).pop().unwrap();

        assert!(matches!(decode(&b, frame), Err(EtcError::Frame(_))));
    }

    #[test]
    fn test_decode_rejects_short_bytes() {
        let profile = builtin(ProfileVersion::B).unwrap();
        assert!(decode_bytes(&profile, &[0x41, 0x56]).is_err());
    }
}
