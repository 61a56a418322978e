//! # Field Registry
//!
//! Maps frame byte offsets to what the byte at that offset means: its name,
//! how it is interpreted, how it is calibrated and which limits it must obey.
//!
//! Registries are plain data. All interpretation logic lives in the decoder
//! and classifier, so a new protocol revision is a new table, not new code.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{EtcError, Result};

/// Error bit mask of a status byte
///
/// A status byte reports an error when any bit selected by its mask is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorMask(pub u8);

impl ErrorMask {
    /// Any set bit is an error
    pub const ANY: ErrorMask = ErrorMask(0xFF);
    /// Only bit 0 is an error
    pub const BIT0: ErrorMask = ErrorMask(0x01);
    /// Bits 0-2
    pub const LOW3: ErrorMask = ErrorMask(0x07);
    /// Bits 0-3
    pub const LOW4: ErrorMask = ErrorMask(0x0F);
    /// Bits 0-4
    pub const LOW5: ErrorMask = ErrorMask(0x1F);
    /// Bits 0-5
    pub const LOW6: ErrorMask = ErrorMask(0x3F);

    /// `true` when `raw` has a bit set under this mask
    pub fn is_error(self, raw: u8) -> bool {
        raw & self.0 != 0
    }
}

/// How the byte at an offset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Protocol constant (header, length, packet id)
    Fixed,
    /// Opaque byte shown as hex
    RawByte,
    /// Status byte shown bit by bit, with a per-field error mask
    BitField(ErrorMask),
    /// MSB of a big-endian 16-bit reading; the LSB follows at `offset + 1`
    CalibratedPair,
    /// Temperature in whole degrees, no enforced limits
    TemperatureDirect,
    /// Unused byte or the LSB half of a calibrated pair
    Reserved,
}

/// Limits a raw value is classified against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RangeRule {
    Exact(u8),
    Bounded { min: u8, max: u8 },
    NotApplicable,
    AlwaysValid,
}

/// How raw bytes are combined before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Combine {
    None,
    MsbLsb16,
}

/// Conversion from register counts to a physical quantity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRule {
    pub combine: Combine,
    pub scale_factor: f64,
    pub unit: String,
}

impl CalibrationRule {
    /// 16-bit MSB/LSB reading scaled by `scale_factor`
    pub fn pair(scale_factor: f64, unit: &str) -> Self {
        Self {
            combine: Combine::MsbLsb16,
            scale_factor,
            unit: unit.to_string(),
        }
    }

    /// Single-byte reading scaled by `scale_factor`
    pub fn single(scale_factor: f64, unit: &str) -> Self {
        Self {
            combine: Combine::None,
            scale_factor,
            unit: unit.to_string(),
        }
    }

    /// Scale a combined register count into physical units
    pub fn apply(&self, count: u16) -> f64 {
        count as f64 * self.scale_factor
    }

    /// Scaled value with three decimals and the unit suffix, e.g. `"0.065 V"`
    pub fn format(&self, count: u16) -> String {
        format!("{:.3} {}", self.apply(count), self.unit)
    }
}

/// Meaning of one frame offset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub offset: usize,
    pub name: String,
    pub kind: FieldKind,
    pub range: RangeRule,
    pub calibration: Option<CalibrationRule>,
    pub pair_partner_offset: Option<usize>,
}

impl FieldDescriptor {
    fn plain(offset: usize, name: &str, kind: FieldKind, range: RangeRule) -> Self {
        Self {
            offset,
            name: name.to_string(),
            kind,
            range,
            calibration: None,
            pair_partner_offset: None,
        }
    }

    /// Protocol constant that must equal `value`
    pub fn fixed(offset: usize, name: &str, value: u8) -> Self {
        Self::plain(offset, name, FieldKind::Fixed, RangeRule::Exact(value))
    }

    /// Opaque byte without limits
    pub fn raw(offset: usize, name: &str) -> Self {
        Self::plain(offset, name, FieldKind::RawByte, RangeRule::NotApplicable)
    }

    /// Status byte with its own error mask
    pub fn bit_field(offset: usize, name: &str, mask: ErrorMask) -> Self {
        Self::plain(offset, name, FieldKind::BitField(mask), RangeRule::NotApplicable)
    }

    /// Temperature byte, always valid
    pub fn temperature(offset: usize, name: &str) -> Self {
        Self::plain(offset, name, FieldKind::TemperatureDirect, RangeRule::AlwaysValid)
    }

    /// Unused byte
    pub fn reserved(offset: usize, name: &str) -> Self {
        Self::plain(offset, name, FieldKind::Reserved, RangeRule::NotApplicable)
    }

    /// Override the limits of this field
    pub fn with_range(mut self, range: RangeRule) -> Self {
        self.range = range;
        self
    }

    /// Attach a calibration to this field
    pub fn with_calibration(mut self, calibration: CalibrationRule) -> Self {
        self.calibration = Some(calibration);
        self
    }
}

/// Offset-ordered set of field descriptors for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldRegistry {
    fields: BTreeMap<usize, FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single field
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::Profile`] if the offset is already taken.
    pub fn insert(&mut self, descriptor: FieldDescriptor) -> Result<()> {
        if let Some(existing) = self.fields.get(&descriptor.offset) {
            return Err(EtcError::Profile(format!(
                "offset {} registered twice ({} and {})",
                descriptor.offset, existing.name, descriptor.name
            )));
        }
        self.fields.insert(descriptor.offset, descriptor);
        Ok(())
    }

    /// Register a calibrated MSB/LSB pair at `offset` and `offset + 1`
    ///
    /// The MSB is the independently interpreted field, bounded to the full
    /// byte range; the LSB is registered as its `Reserved` partner.
    pub fn insert_pair(
        &mut self,
        offset: usize,
        msb_name: &str,
        lsb_name: &str,
        calibration: CalibrationRule,
    ) -> Result<()> {
        let partner = offset + 1;
        self.insert(FieldDescriptor {
            offset,
            name: msb_name.to_string(),
            kind: FieldKind::CalibratedPair,
            range: RangeRule::Bounded { min: 0x00, max: 0xFF },
            calibration: Some(calibration),
            pair_partner_offset: Some(partner),
        })?;
        self.insert(FieldDescriptor::reserved(partner, lsb_name))
    }

    pub fn get(&self, offset: usize) -> Option<&FieldDescriptor> {
        self.fields.get(&offset)
    }

    /// Descriptors in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Registered offsets in ascending order
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check descriptor-level invariants against a frame of `frame_length` bytes
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::Profile`] naming the first offending field.
    pub fn validate(&self, frame_length: usize) -> Result<()> {
        for field in self.iter() {
            if field.offset >= frame_length {
                return Err(EtcError::Profile(format!(
                    "{} at offset {} lies outside the {}-byte frame",
                    field.name, field.offset, frame_length
                )));
            }

            if let RangeRule::Bounded { min, max } = field.range {
                if min > max {
                    return Err(EtcError::Profile(format!(
                        "{} has inverted bounds 0x{:02X}..0x{:02X}",
                        field.name, min, max
                    )));
                }
            }

            let coherent = match field.kind {
                FieldKind::Fixed => matches!(field.range, RangeRule::Exact(_)),
                FieldKind::TemperatureDirect => field.range == RangeRule::AlwaysValid,
                FieldKind::Reserved => field.range == RangeRule::NotApplicable,
                _ => true,
            };
            if !coherent {
                return Err(EtcError::Profile(format!(
                    "{} declares {:?} limits incompatible with {:?}",
                    field.name, field.range, field.kind
                )));
            }

            match field.kind {
                FieldKind::CalibratedPair => self.validate_pair(field)?,
                _ => {
                    if field.pair_partner_offset.is_some() {
                        return Err(EtcError::Profile(format!(
                            "{} is not a calibrated pair but names a partner",
                            field.name
                        )));
                    }
                    if let Some(cal) = &field.calibration {
                        if field.kind != FieldKind::RawByte || cal.combine != Combine::None {
                            return Err(EtcError::Profile(format!(
                                "{} carries a calibration its kind cannot use",
                                field.name
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_pair(&self, field: &FieldDescriptor) -> Result<()> {
        match &field.calibration {
            Some(cal) if cal.combine == Combine::MsbLsb16 => {}
            _ => {
                return Err(EtcError::Profile(format!(
                    "{} is a calibrated pair without an MSB/LSB calibration",
                    field.name
                )))
            }
        }

        let expected = field.offset + 1;
        if field.pair_partner_offset != Some(expected) {
            return Err(EtcError::Profile(format!(
                "{} must pair with offset {}, found {:?}",
                field.name, expected, field.pair_partner_offset
            )));
        }

        match self.get(expected) {
            Some(partner) if partner.kind == FieldKind::Reserved => Ok(()),
            Some(partner) => Err(EtcError::Profile(format!(
                "{} partner {} at offset {} must be reserved, found {:?}",
                field.name, partner.name, expected, partner.kind
            ))),
            None => Err(EtcError::Profile(format!(
                "{} partner offset {} is not registered",
                field.name, expected
            ))),
        }
    }
}
