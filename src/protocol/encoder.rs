//! # Command Encoder
//!
//! Builds outbound control frames from a [`ControlState`].
//!
//! Profiles with a snapshot layout receive the whole control state in one
//! fixed-length frame. Profiles with a toggle layout receive one short frame
//! per control instead (see [`encode_toggle`]).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::checksum::complement_checksum;
use super::profile::{CommandLayout, PacketProfile};
use crate::error::{EtcError, Result};

/// LENGTH byte of toggle command frames
pub const TOGGLE_LENGTH: u8 = 0x05;

/// Toggle command base for discrete outputs (`0x10 + index`)
pub const TOGGLE_DISCRETE_OUTPUT: u8 = 0x10;

/// Toggle command base for LEDs (`0x20 + index`)
pub const TOGGLE_LED: u8 = 0x20;

/// Toggle command enabling the SATA lines
pub const TOGGLE_SATA: u8 = 0x30;

/// Discrete input sensing mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenseMode {
    /// Inputs read OPEN or GND
    #[default]
    OpenGnd,
    /// Inputs read OPEN or 28 V
    #[serde(rename = "open_28v")]
    Open28V,
}

impl SenseMode {
    /// Sense-select byte of the snapshot frame
    pub fn wire_value(self) -> u8 {
        match self {
            SenseMode::OpenGnd => 0x00,
            SenseMode::Open28V => 0x01,
        }
    }
}

/// LED color, in wire bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
}

impl LedColor {
    pub const ALL: [LedColor; 3] = [LedColor::Red, LedColor::Green, LedColor::Blue];

    fn index(self) -> u8 {
        match self {
            LedColor::Red => 0,
            LedColor::Green => 1,
            LedColor::Blue => 2,
        }
    }
}

/// State of the three front-panel LEDs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leds {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl Leds {
    pub fn is_on(&self, color: LedColor) -> bool {
        match color {
            LedColor::Red => self.red,
            LedColor::Green => self.green,
            LedColor::Blue => self.blue,
        }
    }

    /// LED bitmask: bit 0 red, bit 1 green, bit 2 blue
    pub fn mask(&self) -> u8 {
        LedColor::ALL
            .iter()
            .filter(|&&color| self.is_on(color))
            .fold(0, |mask, color| mask | 1 << color.index())
    }
}

/// One-shot SATA zeroize request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroizeCode {
    #[default]
    None,
    /// Zeroize SATA1 only
    Sata1,
    /// Zeroize SATA0 and SATA1
    AllSata,
}

impl ZeroizeCode {
    /// Two-byte code written into the snapshot frame
    pub fn bytes(self) -> [u8; 2] {
        match self {
            ZeroizeCode::None => [0x00, 0x00],
            ZeroizeCode::Sata1 => [0xAA, 0x55],
            ZeroizeCode::AllSata => [0xBB, 0x44],
        }
    }

    /// SATA zeroize request of the toggle layout, if any
    pub fn toggle_command(self) -> Option<ToggleCommand> {
        match self {
            ZeroizeCode::None => None,
            ZeroizeCode::Sata1 => Some(ToggleCommand::SataEnable {
                sata0: false,
                sata1: true,
            }),
            ZeroizeCode::AllSata => Some(ToggleCommand::SataEnable {
                sata0: true,
                sata1: true,
            }),
        }
    }
}

/// Operator-controlled outputs of the board
///
/// Everything except the zeroize code is persistent: it is re-sent unchanged
/// with every frame. The zeroize code must be cleared by the caller once the
/// frame carrying it went out, see [`ControlState::clear_one_shot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub sense_mode: SenseMode,
    /// Indices of enabled discrete outputs
    pub discrete_outputs: BTreeSet<usize>,
    pub leds: Leds,
    pub zeroize: ZeroizeCode,
}

impl ControlState {
    /// Reset one-shot fields after the frame carrying them was sent
    pub fn clear_one_shot(&mut self) {
        self.zeroize = ZeroizeCode::None;
    }

    pub fn set_output(&mut self, index: usize, enabled: bool) {
        if enabled {
            self.discrete_outputs.insert(index);
        } else {
            self.discrete_outputs.remove(&index);
        }
    }

    pub fn output_enabled(&self, index: usize) -> bool {
        self.discrete_outputs.contains(&index)
    }
}

/// Encoded outbound frame, written to the transport verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Space-separated uppercase hex, for logs
    pub fn to_hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("0x{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Encode `state` into one snapshot command frame
///
/// Frame layout, with `h` the header length:
///
/// ```text
/// [0..h]    header
/// [h]       frame length
/// [h+1]     command id
/// [h+2]     sense select
/// [h+3]     discrete output bitmask (bit i = output i)
/// [h+4..h+6] zeroize code
/// [h+6]     reserved
/// [h+7]     LED bitmask
/// ...       zero padding
/// [last]    complement checksum over all preceding bytes
/// ```
///
/// # Errors
///
/// Returns [`EtcError::EncodeState`] if the profile has no snapshot layout or
/// an enabled output index is beyond the layout's output count.
///
/// # Examples
///
/// ```
/// use etc_monitor::protocol::encoder::{encode, ControlState};
/// use etc_monitor::protocol::profile::ProfileVersion;
/// use etc_monitor::protocol::profiles::builtin;
///
/// let profile = builtin(ProfileVersion::B).unwrap();
/// let frame = encode(&profile, &ControlState::default()).unwrap();
/// assert_eq!(frame.len(), 37);
/// assert_eq!(&frame.as_bytes()[..4], &[0x41, 0x56, 0x25, 0x01]);
/// ```
pub fn encode(profile: &PacketProfile, state: &ControlState) -> Result<CommandFrame> {
    let CommandLayout::Snapshot {
        frame_length,
        command_id,
        discrete_outputs,
    } = profile.command()
    else {
        return Err(EtcError::EncodeState(format!(
            "profile {} sends per-control toggle commands, not snapshots",
            profile.version()
        )));
    };

    let outputs = output_mask(state, discrete_outputs)?;
    let header = profile.header_bytes();
    let h = header.len();

    let mut bytes = vec![0u8; frame_length];
    bytes[..h].copy_from_slice(header);
    // Profile validation bounds snapshot frames to 255 bytes.
    bytes[h] = frame_length as u8;
    bytes[h + 1] = command_id;
    bytes[h + 2] = state.sense_mode.wire_value();
    bytes[h + 3] = outputs;
    bytes[h + 4..h + 6].copy_from_slice(&state.zeroize.bytes());
    bytes[h + 7] = state.leds.mask();

    let last = frame_length - 1;
    bytes[last] = complement_checksum(&bytes[..last]);

    Ok(CommandFrame { bytes })
}

fn output_mask(state: &ControlState, count: usize) -> Result<u8> {
    state
        .discrete_outputs
        .iter()
        .try_fold(0u8, |mask, &index| {
            if index < count {
                Ok(mask | 1 << index)
            } else {
                Err(EtcError::EncodeState(format!(
                    "discrete output {} does not exist (board has {})",
                    index, count
                )))
            }
        })
}

/// Single-control command of the toggle layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleCommand {
    DiscreteOutput { index: usize, enable: bool },
    Led { color: LedColor, enable: bool },
    SataEnable { sata0: bool, sata1: bool },
}

/// Encode one toggle command frame: `header | 0x05 | command | argument | checksum`
///
/// # Errors
///
/// Returns [`EtcError::EncodeState`] if the profile has no toggle layout or
/// the output index is beyond the layout's output count.
pub fn encode_toggle(profile: &PacketProfile, command: ToggleCommand) -> Result<CommandFrame> {
    let CommandLayout::Toggle { discrete_outputs } = profile.command() else {
        return Err(EtcError::EncodeState(format!(
            "profile {} sends snapshot commands, not toggles",
            profile.version()
        )));
    };

    let (code, argument) = match command {
        ToggleCommand::DiscreteOutput { index, enable } => {
            if index >= discrete_outputs {
                return Err(EtcError::EncodeState(format!(
                    "discrete output {} does not exist (board has {})",
                    index, discrete_outputs
                )));
            }
            // Bounded by the 8-output limit checked at profile validation.
            (TOGGLE_DISCRETE_OUTPUT + index as u8, enable as u8)
        }
        ToggleCommand::Led { color, enable } => (TOGGLE_LED + color.index(), enable as u8),
        ToggleCommand::SataEnable { sata0, sata1 } => {
            (TOGGLE_SATA, (sata0 as u8) | (sata1 as u8) << 1)
        }
    };

    let mut bytes = profile.header_bytes().to_vec();
    bytes.extend_from_slice(&[TOGGLE_LENGTH, code, argument]);
    bytes.push(complement_checksum(&bytes));

    Ok(CommandFrame { bytes })
}

/// Toggle frames that bring the board to `state`: every discrete output,
/// then every LED, then the pending zeroize request
///
/// Sense mode has no toggle command and is not transmitted.
///
/// # Errors
///
/// Same as [`encode_toggle`], plus an enabled output the layout lacks.
pub fn encode_toggle_state(profile: &PacketProfile, state: &ControlState) -> Result<Vec<CommandFrame>> {
    let count = profile.command().discrete_outputs();
    output_mask(state, count)?;

    let outputs = (0..count).map(|index| ToggleCommand::DiscreteOutput {
        index,
        enable: state.output_enabled(index),
    });
    let leds = LedColor::ALL.into_iter().map(|color| ToggleCommand::Led {
        color,
        enable: state.leds.is_on(color),
    });

    outputs
        .chain(leds)
        .chain(state.zeroize.toggle_command())
        .map(|command| encode_toggle(profile, command))
        .collect()
}
