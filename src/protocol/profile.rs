//! # Packet Profiles
//!
//! A [`PacketProfile`] is the complete, immutable description of one
//! generation of the wire protocol: frame geometry, checksum discipline,
//! field registry, command layout and status indicator offsets.
//!
//! Profiles are validated once at start-up. Everything downstream (scanner,
//! decoder, encoder) trusts them and never re-checks per frame.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::checksum::ChecksumRule;
use super::registry::{FieldKind, FieldRegistry, RangeRule};
use crate::error::{EtcError, Result};

/// Number of leading offsets that must carry protocol constants
/// (HEADER_1, HEADER_2, LENGTH, PACKET_ID)
pub const FIXED_PREAMBLE_LEN: usize = 4;

/// Identifier of a supported protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVersion {
    /// Earlier layout: 128-byte payload after the 4-byte preamble,
    /// per-control toggle commands
    A,
    /// Latest layout: 132-byte payload addressed from offset 0,
    /// 37-byte snapshot command frame
    B,
}

impl fmt::Display for ProfileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileVersion::A => write!(f, "A"),
            ProfileVersion::B => write!(f, "B"),
        }
    }
}

impl FromStr for ProfileVersion {
    type Err = EtcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(ProfileVersion::A),
            "b" => Ok(ProfileVersion::B),
            other => Err(EtcError::Profile(format!("unknown profile '{}'", other))),
        }
    }
}

/// Shape of outbound command frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLayout {
    /// One frame carrying the whole control state
    ///
    /// ```text
    /// header | length | id | sense | outputs | zeroize(2) | reserved | leds | padding | checksum
    /// ```
    Snapshot {
        frame_length: usize,
        command_id: u8,
        discrete_outputs: usize,
    },

    /// One short frame per control change
    ///
    /// ```text
    /// header | 0x05 | command | argument | checksum
    /// ```
    Toggle { discrete_outputs: usize },
}

impl CommandLayout {
    /// Number of discrete outputs addressable through this layout
    pub fn discrete_outputs(&self) -> usize {
        match *self {
            CommandLayout::Snapshot { discrete_outputs, .. } => discrete_outputs,
            CommandLayout::Toggle { discrete_outputs } => discrete_outputs,
        }
    }
}

/// Offsets of the bytes behind the board's status indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLayout {
    pub disc_in: usize,
    pub sata0: usize,
    pub sata1: usize,
    pub gpu: usize,
    pub pmon: usize,
}

impl StatusLayout {
    /// Same indicator bytes, shifted by `base` frame bytes
    pub fn at(base: usize) -> Self {
        Self {
            disc_in: base + 20,
            sata0: base + 32,
            sata1: base + 39,
            gpu: base + 46,
            pmon: base + 25,
        }
    }

    fn offsets(&self) -> [usize; 5] {
        [self.disc_in, self.sata0, self.sata1, self.gpu, self.pmon]
    }
}

/// Unvalidated inputs to [`PacketProfile::new`]
#[derive(Debug, Clone)]
pub struct ProfileDefinition {
    pub version: ProfileVersion,
    pub frame_length: usize,
    pub header_bytes: Vec<u8>,
    pub payload: Range<usize>,
    pub checksum_rule: ChecksumRule,
    pub registry: FieldRegistry,
    pub command: CommandLayout,
    pub status: StatusLayout,
}

/// Validated description of one protocol generation
#[derive(Debug, Clone)]
pub struct PacketProfile {
    version: ProfileVersion,
    frame_length: usize,
    header_bytes: Vec<u8>,
    payload: Range<usize>,
    checksum_rule: ChecksumRule,
    registry: FieldRegistry,
    command: CommandLayout,
    status: StatusLayout,
}

impl PacketProfile {
    /// Validate a definition and freeze it into a profile
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::Profile`] if:
    /// - the frame is empty or the header is empty or longer than the frame
    /// - the payload range leaves the frame
    /// - a header byte disagrees with the `Exact` field at its offset
    /// - any registry invariant fails (see [`FieldRegistry::validate`])
    /// - the command or status layout does not fit
    pub fn new(definition: ProfileDefinition) -> Result<Self> {
        let ProfileDefinition {
            version,
            frame_length,
            header_bytes,
            payload,
            checksum_rule,
            registry,
            command,
            status,
        } = definition;

        if frame_length == 0 {
            return Err(EtcError::Profile(format!("profile {}: frame length is zero", version)));
        }

        if header_bytes.is_empty() || header_bytes.len() > frame_length {
            return Err(EtcError::Profile(format!(
                "profile {}: header of {} bytes does not fit a {}-byte frame",
                version,
                header_bytes.len(),
                frame_length
            )));
        }

        if payload.start > payload.end || payload.end > frame_length {
            return Err(EtcError::Profile(format!(
                "profile {}: payload {:?} exceeds the {}-byte frame",
                version, payload, frame_length
            )));
        }

        registry.validate(frame_length).map_err(|e| match e {
            EtcError::Profile(msg) => EtcError::Profile(format!("profile {}: {}", version, msg)),
            other => other,
        })?;

        Self::validate_preamble(version, &header_bytes, &registry)?;
        Self::validate_command(version, &header_bytes, command)?;

        if let Some(offset) = status.offsets().into_iter().find(|&o| o >= frame_length) {
            return Err(EtcError::Profile(format!(
                "profile {}: status offset {} lies outside the frame",
                version, offset
            )));
        }

        Ok(Self {
            version,
            frame_length,
            header_bytes,
            payload,
            checksum_rule,
            registry,
            command,
            status,
        })
    }

    fn validate_preamble(
        version: ProfileVersion,
        header_bytes: &[u8],
        registry: &FieldRegistry,
    ) -> Result<()> {
        for offset in 0..FIXED_PREAMBLE_LEN.max(header_bytes.len()) {
            let field = registry.get(offset).ok_or_else(|| {
                EtcError::Profile(format!(
                    "profile {}: preamble offset {} has no fixed field",
                    version, offset
                ))
            })?;

            let RangeRule::Exact(value) = field.range else {
                return Err(EtcError::Profile(format!(
                    "profile {}: preamble field {} is not an exact constant",
                    version, field.name
                )));
            };

            if field.kind != FieldKind::Fixed {
                return Err(EtcError::Profile(format!(
                    "profile {}: preamble field {} must be fixed",
                    version, field.name
                )));
            }

            if let Some(&header) = header_bytes.get(offset) {
                if header != value {
                    return Err(EtcError::Profile(format!(
                        "profile {}: header byte {} is 0x{:02X} but {} expects 0x{:02X}",
                        version, offset, header, field.name, value
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_command(
        version: ProfileVersion,
        header_bytes: &[u8],
        command: CommandLayout,
    ) -> Result<()> {
        if command.discrete_outputs() > 8 {
            return Err(EtcError::Profile(format!(
                "profile {}: {} discrete outputs do not fit one bitmask byte",
                version,
                command.discrete_outputs()
            )));
        }

        if let CommandLayout::Snapshot { frame_length, .. } = command {
            // header, length, id, sense, outputs, zeroize x2, reserved, leds, checksum
            let minimum = header_bytes.len() + 9;
            if frame_length < minimum || frame_length > u8::MAX as usize {
                return Err(EtcError::Profile(format!(
                    "profile {}: command frame of {} bytes must be between {} and 255",
                    version, frame_length, minimum
                )));
            }
        }
        Ok(())
    }

    pub fn version(&self) -> ProfileVersion {
        self.version
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    /// Frame offsets carrying payload data
    pub fn payload(&self) -> Range<usize> {
        self.payload.clone()
    }

    pub fn checksum_rule(&self) -> ChecksumRule {
        self.checksum_rule
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn command(&self) -> CommandLayout {
        self.command
    }

    pub fn status(&self) -> StatusLayout {
        self.status
    }
}
