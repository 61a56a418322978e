//! # Built-in Profiles
//!
//! Register tables for the two protocol generations seen on the ETC board.
//!
//! Both generations share the same 133-byte frame, but they address the
//! payload differently:
//!
//! - **Profile A** carries a 128-byte payload after the 4-byte preamble
//!   (payload index `i` lives at frame offset `4 + i`). Readings are shown
//!   raw; commands are short per-control toggles.
//! - **Profile B** addresses all 132 data bytes from offset 0, so the
//!   preamble itself is part of the payload. Readings are calibrated and
//!   status bytes carry per-field error masks; commands are 37-byte
//!   snapshots.

use std::sync::Arc;

use super::checksum::ChecksumRule;
use super::profile::{
    CommandLayout, PacketProfile, ProfileDefinition, ProfileVersion, StatusLayout,
};
use super::registry::{CalibrationRule, ErrorMask, FieldDescriptor, FieldRegistry, RangeRule};
use crate::error::Result;

/// First header byte
pub const HEADER_1: u8 = 0x41;

/// Second header byte
pub const HEADER_2: u8 = 0x56;

/// LENGTH field of telemetry frames (133)
pub const TELEMETRY_LENGTH: u8 = 0x85;

/// PACKET_ID of telemetry frames
pub const TELEMETRY_PACKET_ID: u8 = 0x02;

/// Telemetry frame size shared by both generations
pub const TELEMETRY_FRAME_LENGTH: usize = 133;

/// Snapshot command frame size
pub const COMMAND_FRAME_LENGTH: usize = 37;

/// PACKET_ID of snapshot command frames
pub const COMMAND_PACKET_ID: u8 = 0x01;

/// Discrete outputs on the board
pub const DISCRETE_OUTPUTS: usize = 4;

/// Status bytes and their error masks, by payload index
const STATUS_FIELDS: [(usize, &str, ErrorMask); 19] = [
    (6, "I2C_ACK_STATUS_1", ErrorMask::ANY),
    (7, "I2C_ACK_STATUS_2", ErrorMask::ANY),
    (8, "I2C_ACK_STATUS_3", ErrorMask::ANY),
    (9, "I2C_ACK_STATUS_4", ErrorMask::ANY),
    (10, "I2C_ACK_STATUS_5", ErrorMask::LOW6),
    (11, "UART_STATUS", ErrorMask::BIT0),
    (12, "CPU_STATUS", ErrorMask::BIT0),
    (13, "HSN_STATUS", ErrorMask::BIT0),
    (14, "SATA_STATUS", ErrorMask::LOW4),
    (15, "USB_STATUS", ErrorMask::LOW3),
    (16, "JTAG_STATUS", ErrorMask::BIT0),
    (17, "GPU_STATUS_1", ErrorMask::ANY),
    (18, "GPU_STATUS_2", ErrorMask::BIT0),
    (19, "HDMI_STATUS", ErrorMask::BIT0),
    (20, "DISC_IN_STATUS", ErrorMask::ANY),
    (21, "DISC_DISCREPANCY_CHECK", ErrorMask::LOW5),
    (22, "DISC_OUT_BIT_STATUS", ErrorMask::ANY),
    (23, "DISC_OUT_LB_FAIL_STATUS", ErrorMask::LOW4),
    (24, "DISC_OUT_FAULT_STATUS", ErrorMask::ANY),
];

const TEMPERATURES: [(usize, &str); 7] = [
    (79, "TMP100_CPLD_TEMP"),
    (80, "TMP100_GPU_TEMP"),
    (81, "TMP100_CARRIER_TEMP"),
    (82, "TMP100_PWR_REG_TEMP"),
    (83, "TMP100_PWR_BOARD_TEMP"),
    (84, "TMP100_IGLOO2_TEMP"),
    (85, "GPU_TEMP"),
];

const HSN_TRANS_DATA: [&str; 8] = [
    "HSN_TRANS_DATA_1",
    "HSN_TRANS_DATA_2",
    "HSN_TRANS_DATA_3",
    "HSN_TRANS_DATA_4",
    "HSN_TRANS_DATA_5",
    "HSN_TRANS_DATA_6",
    "HSN_TRANS_DATA_7",
    "HSN_TRANS_DATA_8",
];

/// Sensor mode of a power rail, selecting its scale factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailScale {
    /// LTC4281 on a 12 V rail
    Ltc12V,
    /// LTC4281 on a 3.3 V rail
    Ltc3V3,
    /// LTC4281 on a 5 V rail
    Ltc5V,
    /// INA260 secondary sensor
    Ina260,
}

impl RailScale {
    pub fn voltage(self) -> CalibrationRule {
        let factor = match self {
            RailScale::Ltc12V => 0.254e-3,
            RailScale::Ltc3V3 => 0.0847e-3,
            RailScale::Ltc5V => 0.127e-3,
            RailScale::Ina260 => 1.25e-3,
        };
        CalibrationRule::pair(factor, "V")
    }

    pub fn current(self) -> CalibrationRule {
        let factor = match self {
            RailScale::Ina260 => 1.25e-3,
            _ => 0.305e-3,
        };
        CalibrationRule::pair(factor, "A")
    }

    pub fn power(self) -> CalibrationRule {
        let factor = match self {
            RailScale::Ltc12V => 5.08e-3,
            RailScale::Ltc3V3 => 1.69e-3,
            RailScale::Ltc5V => 2.54e-3,
            RailScale::Ina260 => 10e-3,
        };
        CalibrationRule::pair(factor, "W")
    }
}

/// One monitored power rail: optional status byte, then voltage, current and
/// power as MSB/LSB pairs
struct Rail {
    index: usize,
    status: Option<&'static str>,
    prefix: &'static str,
    scale: RailScale,
}

impl Rail {
    const fn ltc(index: usize, status: &'static str, prefix: &'static str, scale: RailScale) -> Self {
        Self {
            index,
            status: Some(status),
            prefix,
            scale,
        }
    }

    const fn ina(index: usize, prefix: &'static str) -> Self {
        Self {
            index,
            status: None,
            prefix,
            scale: RailScale::Ina260,
        }
    }

    fn first_reading(&self) -> usize {
        if self.status.is_some() {
            self.index + 1
        } else {
            self.index
        }
    }

    fn readings(&self) -> [(usize, &'static str, CalibrationRule); 3] {
        let first = self.first_reading();
        [
            (first, "VOLTAGE", self.scale.voltage()),
            (first + 2, "CURRENT", self.scale.current()),
            (first + 4, "POWER", self.scale.power()),
        ]
    }
}

const RAILS_A: [Rail; 8] = [
    Rail::ltc(25, "LTC4281_PMON_STATUS", "LTC4281_PMON", RailScale::Ltc12V),
    Rail::ltc(32, "LTC4281_SATA0_STATUS", "LTC4281_SATA0", RailScale::Ltc3V3),
    Rail::ltc(39, "LTC4281_SATA1_STATUS", "LTC4281_SATA1", RailScale::Ltc3V3),
    Rail::ltc(46, "LTC4281_GPU_12V_STATUS", "LTC4281_GPU_12V", RailScale::Ltc12V),
    Rail::ltc(53, "LTC4281_GPU_3V3_STATUS", "LTC4281_GPU_3V3", RailScale::Ltc3V3),
    Rail::ltc(60, "LTC4281_GPU_5V_STATUS", "LTC4281_GPU_5V", RailScale::Ltc5V),
    Rail::ina(67, "INA260_PWR_BOARD"),
    Rail::ina(73, "INA260_PMON"),
];

const RAILS_B: [Rail; 8] = [
    Rail::ltc(25, "LTC4281_CPU_12V_STATUS", "LTC4281_CPU", RailScale::Ltc12V),
    Rail::ltc(32, "LTC4281_SATA0_3V3_STATUS", "LTC4281_SATA0_3V3", RailScale::Ltc3V3),
    Rail::ltc(39, "LTC4281_SATA1_3V3_STATUS", "LTC4281_SATA1_3V3", RailScale::Ltc3V3),
    Rail::ltc(46, "LTC4281_GPU_12V_STATUS", "LTC4281_GPU_12V", RailScale::Ltc12V),
    Rail::ltc(53, "LTC4281_GPU_5V_STATUS", "LTC4281_GPU_5V", RailScale::Ltc5V),
    Rail::ltc(60, "LTC4281_GPU_3V3_STATUS", "LTC4281_GPU_3V3", RailScale::Ltc3V3),
    Rail::ina(67, "INA260_PWR_BOARD_27V"),
    Rail::ina(73, "INA260_CPLD_3V3"),
];

/// Build and validate the built-in profile for `version`
///
/// # Errors
///
/// Returns [`crate::error::EtcError::Profile`] if the table is inconsistent,
/// which would be a bug in this module.
pub fn builtin(version: ProfileVersion) -> Result<Arc<PacketProfile>> {
    let profile = match version {
        ProfileVersion::A => profile_a()?,
        ProfileVersion::B => profile_b()?,
    };
    Ok(Arc::new(profile))
}

fn insert_preamble(registry: &mut FieldRegistry) -> Result<()> {
    registry.insert(FieldDescriptor::fixed(0, "HEADER_1", HEADER_1))?;
    registry.insert(FieldDescriptor::fixed(1, "HEADER_2", HEADER_2))?;
    registry.insert(FieldDescriptor::fixed(2, "LENGTH", TELEMETRY_LENGTH))?;
    registry.insert(FieldDescriptor::fixed(3, "PACKET_ID", TELEMETRY_PACKET_ID))
}

fn insert_temperatures(registry: &mut FieldRegistry, base: usize) -> Result<()> {
    for (index, name) in TEMPERATURES {
        registry.insert(FieldDescriptor::temperature(base + index, name))?;
    }
    Ok(())
}

fn insert_tail(
    registry: &mut FieldRegistry,
    base: usize,
    reserved: std::ops::RangeInclusive<usize>,
    loopback: std::ops::RangeInclusive<usize>,
) -> Result<()> {
    for (i, name) in HSN_TRANS_DATA.iter().enumerate() {
        registry.insert(FieldDescriptor::raw(base + 86 + i, name))?;
    }
    for index in reserved {
        registry.insert(FieldDescriptor::reserved(base + index, "RESERVED"))?;
    }
    for index in loopback {
        registry.insert(FieldDescriptor::raw(base + index, "UART_LOOPBACK"))?;
    }
    Ok(())
}

/// Earlier generation: raw readings, payload shifted past the preamble
fn profile_a() -> Result<PacketProfile> {
    const BASE: usize = 4;
    let full_byte = RangeRule::Bounded { min: 0x00, max: 0xFF };

    let mut registry = FieldRegistry::new();
    insert_preamble(&mut registry)?;

    // Payload indices 0-3 echo the preamble on this generation.
    for (i, (name, value)) in [
        ("HEADER_1_ECHO", HEADER_1),
        ("HEADER_2_ECHO", HEADER_2),
        ("LENGTH_ECHO", TELEMETRY_LENGTH),
        ("PACKET_ID_ECHO", TELEMETRY_PACKET_ID),
    ]
    .into_iter()
    .enumerate()
    {
        registry.insert(FieldDescriptor::fixed(BASE + i, name, value))?;
    }
    registry.insert(FieldDescriptor::raw(BASE + 4, "FPGA_VERSION"))?;
    registry.insert(FieldDescriptor::raw(BASE + 5, "FPGA_REVISION"))?;

    for (index, name, _) in STATUS_FIELDS {
        let name = if index == 20 { "DISC_IN_VALUES" } else { name };
        registry.insert(FieldDescriptor::raw(BASE + index, name))?;
    }

    for rail in &RAILS_A {
        if let Some(status) = rail.status {
            registry.insert(FieldDescriptor::raw(BASE + rail.index, status))?;
        }
        for (index, quantity, _) in rail.readings() {
            for (half, suffix) in [(0, 1), (1, 2)] {
                let name = format!("{}_{}_{}", rail.prefix, quantity, suffix);
                registry.insert(
                    FieldDescriptor::raw(BASE + index + half, &name).with_range(full_byte),
                )?;
            }
        }
    }

    insert_temperatures(&mut registry, BASE)?;
    insert_tail(&mut registry, BASE, 94..=124, 125..=127)?;

    PacketProfile::new(ProfileDefinition {
        version: ProfileVersion::A,
        frame_length: TELEMETRY_FRAME_LENGTH,
        header_bytes: vec![HEADER_1, HEADER_2],
        payload: BASE..TELEMETRY_FRAME_LENGTH - 1,
        checksum_rule: ChecksumRule::SumModuloZeroOverWholeFrame,
        registry,
        command: CommandLayout::Toggle {
            discrete_outputs: DISCRETE_OUTPUTS,
        },
        status: StatusLayout::at(BASE),
    })
}

/// Latest generation: calibrated readings, payload addressed from offset 0
fn profile_b() -> Result<PacketProfile> {
    let mut registry = FieldRegistry::new();
    insert_preamble(&mut registry)?;

    registry.insert(FieldDescriptor::raw(4, "FPGA_VERSION"))?;
    registry.insert(FieldDescriptor::raw(5, "FPGA_REVISION"))?;

    for (index, name, mask) in STATUS_FIELDS {
        registry.insert(FieldDescriptor::bit_field(index, name, mask))?;
    }

    for rail in &RAILS_B {
        if let Some(status) = rail.status {
            registry.insert(FieldDescriptor::bit_field(rail.index, status, ErrorMask::ANY))?;
        }
        for (index, quantity, calibration) in rail.readings() {
            let msb = format!("{}_{}_1", rail.prefix, quantity);
            let lsb = format!("{}_{}_2", rail.prefix, quantity);
            registry.insert_pair(index, &msb, &lsb, calibration)?;
        }
    }

    insert_temperatures(&mut registry, 0)?;
    // Offset 127 has no assigned meaning on this generation.
    insert_tail(&mut registry, 0, 94..=126, 128..=131)?;

    PacketProfile::new(ProfileDefinition {
        version: ProfileVersion::B,
        frame_length: TELEMETRY_FRAME_LENGTH,
        header_bytes: vec![HEADER_1, HEADER_2],
        payload: 0..TELEMETRY_FRAME_LENGTH - 1,
        checksum_rule: ChecksumRule::SumModuloZeroOverWholeFrame,
        registry,
        command: CommandLayout::Snapshot {
            frame_length: COMMAND_FRAME_LENGTH,
            command_id: COMMAND_PACKET_ID,
            discrete_outputs: DISCRETE_OUTPUTS,
        },
        status: StatusLayout::at(0),
    })
}
