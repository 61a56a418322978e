//! # Additive Checksums
//!
//! 8-bit additive checksums used by the ETC UART link.
//!
//! Both disciplines reduce to "the truncated sum of the whole frame is zero",
//! but they differ in what the last byte means: under
//! [`ChecksumRule::SumComplementExcludingChecksum`] it is a dedicated checksum
//! byte computed over everything before it, which is also how outbound
//! command frames are sealed.

use serde::{Deserialize, Serialize};

use crate::error::{EtcError, Result};

/// Checksum discipline declared by a packet profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumRule {
    /// Last byte is `(256 - sum(preceding) mod 256) mod 256`
    SumComplementExcludingChecksum,

    /// 8-bit truncated sum of every byte in the frame is zero
    SumModuloZeroOverWholeFrame,
}

/// 8-bit truncated sum of `data`
///
/// # Examples
///
/// ```
/// use etc_monitor::protocol::checksum::sum8;
///
/// assert_eq!(sum8(&[0xFF, 0x02]), 0x01);
/// ```
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Complement checksum for `data`
///
/// Appending the returned byte to `data` makes the whole sequence sum to zero.
///
/// # Examples
///
/// ```
/// use etc_monitor::protocol::checksum::{complement_checksum, sum8};
///
/// let data = [0x41, 0x56, 0x25, 0x01];
/// let checksum = complement_checksum(&data);
/// assert_eq!(sum8(&data).wrapping_add(checksum), 0);
/// ```
pub fn complement_checksum(data: &[u8]) -> u8 {
    0u8.wrapping_sub(sum8(data))
}

/// Verify `frame` against `rule`
///
/// # Errors
///
/// Returns [`EtcError::ChecksumMismatch`] carrying the checksum byte the frame
/// should have ended with and the one it actually carries. An empty frame
/// never validates.
pub fn verify(rule: ChecksumRule, frame: &[u8]) -> Result<()> {
    let Some((&actual, body)) = frame.split_last() else {
        return Err(EtcError::Frame("empty frame has no checksum".to_string()));
    };

    let valid = match rule {
        ChecksumRule::SumModuloZeroOverWholeFrame => sum8(frame) == 0,
        ChecksumRule::SumComplementExcludingChecksum => {
            sum8(body).wrapping_add(actual) == 0
        }
    };

    if valid {
        Ok(())
    } else {
        Err(EtcError::ChecksumMismatch {
            expected: complement_checksum(body),
            actual,
        })
    }
}

/// `true` when `frame` satisfies `rule`
pub fn is_valid(rule: ChecksumRule, frame: &[u8]) -> bool {
    verify(rule, frame).is_ok()
}
