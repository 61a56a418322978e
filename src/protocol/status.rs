//! # Board Status
//!
//! Condenses a [`Record`] into the handful of indicators an operator watches:
//! rail enables, PMON power-good and the discrete input levels.

use std::fmt;

use serde::Serialize;

use super::decoder::Record;
use super::encoder::SenseMode;
use super::profile::PacketProfile;

/// Bit set in an LTC4281 status byte while the rail is switched on
const RAIL_ON: u8 = 0x80;

/// Number of discrete inputs reported in DISC_IN
pub const DISCRETE_INPUTS: usize = 4;

/// Level of one discrete input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscLevel {
    Open,
    Ground,
    Volts28,
}

impl fmt::Display for DiscLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscLevel::Open => write!(f, "OPEN"),
            DiscLevel::Ground => write!(f, "GND"),
            DiscLevel::Volts28 => write!(f, "28V"),
        }
    }
}

/// Operator-facing indicators derived from one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStatus {
    pub sata0_enabled: bool,
    pub sata1_enabled: bool,
    pub gpu_enabled: bool,
    pub pmon_power_good: bool,
    pub discrete_inputs: [DiscLevel; DISCRETE_INPUTS],
}

impl BoardStatus {
    /// Read the indicators out of `record`
    ///
    /// An asserted discrete input reads as the active level of `sense_mode`.
    /// Offsets missing from the record read as cleared.
    pub fn summarize(profile: &PacketProfile, record: &Record, sense_mode: SenseMode) -> Self {
        let layout = profile.status();
        let byte = |offset: usize| record.raw(offset).unwrap_or(0);
        let rail_on = |offset: usize| byte(offset) & RAIL_ON != 0;

        let active = match sense_mode {
            SenseMode::OpenGnd => DiscLevel::Ground,
            SenseMode::Open28V => DiscLevel::Volts28,
        };
        let disc_in = byte(layout.disc_in);
        let discrete_inputs = std::array::from_fn(|bit| {
            if disc_in & (1 << bit) != 0 {
                active
            } else {
                DiscLevel::Open
            }
        });

        Self {
            sata0_enabled: rail_on(layout.sata0),
            sata1_enabled: rail_on(layout.sata1),
            gpu_enabled: rail_on(layout.gpu),
            pmon_power_good: rail_on(layout.pmon),
            discrete_inputs,
        }
    }
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |on: bool| if on { "ON" } else { "OFF" };
        write!(
            f,
            "SATA0={} SATA1={} GPU={} PMON={} DISC_IN=[{}]",
            on_off(self.sata0_enabled),
            on_off(self.sata1_enabled),
            on_off(self.gpu_enabled),
            if self.pmon_power_good { "GOOD" } else { "FAIL" },
            self.discrete_inputs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}
