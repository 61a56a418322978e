//! Shared helpers for integration tests

#![allow(dead_code)]

pub use etc_monitor::protocol::checksum::{complement_checksum, is_valid, ChecksumRule};
pub use etc_monitor::protocol::classifier::{classify, Classification};
pub use etc_monitor::protocol::decoder::{decode, decode_bytes, Record};
pub use etc_monitor::protocol::encoder::{encode, ControlState, Leds, SenseMode, ZeroizeCode};
pub use etc_monitor::protocol::profile::ProfileVersion;
pub use etc_monitor::protocol::profiles::builtin;
pub use etc_monitor::protocol::registry::RangeRule;
pub use etc_monitor::protocol::scanner::FrameScanner;

pub const HEADER: [u8; 4] = [0x41, 0x56, 0x85, 0x02];

/// Valid 133-byte telemetry frame with `patch` applied before the checksum
pub fn telemetry_frame(patch: &[(usize, u8)]) -> Vec<u8> {
    let mut frame = vec![0u8; 133];
    frame[..4].copy_from_slice(&HEADER);
    for &(offset, value) in patch {
        frame[offset] = value;
    }
    frame[132] = complement_checksum(&frame[..132]);
    frame
}

/// Deterministic pseudo-random bytes (xorshift) that never contain 0x41
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            match state as u8 {
                0x41 => 0x40,
                b => b,
            }
        })
        .collect()
}
