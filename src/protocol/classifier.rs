//! # Range Classifier
//!
//! Verdicts attached to every decoded value. Presentation colors and alerts
//! are driven solely by these.

use serde::Serialize;

use super::decoder::Record;
use super::registry::RangeRule;

/// Verdict for one interpreted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Valid,
    OutOfRange,
    NotApplicable,
    Fixed,
}

/// Classify `raw` against `range`
///
/// # Examples
///
/// ```
/// use etc_monitor::protocol::classifier::{classify, Classification};
/// use etc_monitor::protocol::registry::RangeRule;
///
/// assert_eq!(classify(&RangeRule::Exact(0x41), 0x41), Classification::Fixed);
/// assert_eq!(classify(&RangeRule::Exact(0x41), 0x00), Classification::OutOfRange);
/// ```
pub fn classify(range: &RangeRule, raw: u8) -> Classification {
    match *range {
        RangeRule::Exact(value) if raw == value => Classification::Fixed,
        RangeRule::Exact(_) => Classification::OutOfRange,
        RangeRule::Bounded { min, max } if (min..=max).contains(&raw) => Classification::Valid,
        RangeRule::Bounded { .. } => Classification::OutOfRange,
        RangeRule::NotApplicable => Classification::NotApplicable,
        RangeRule::AlwaysValid => Classification::Valid,
    }
}

/// Per-verdict counts over a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub valid: usize,
    pub out_of_range: usize,
    pub not_applicable: usize,
    pub fixed: usize,
    /// Bit fields whose error mask matched
    pub flagged: usize,
}

impl Tally {
    pub fn of(record: &Record) -> Self {
        record.values().fold(Self::default(), |mut tally, value| {
            match value.classification {
                Classification::Valid => tally.valid += 1,
                Classification::OutOfRange => tally.out_of_range += 1,
                Classification::NotApplicable => tally.not_applicable += 1,
                Classification::Fixed => tally.fixed += 1,
            }
            if value.is_error == Some(true) {
                tally.flagged += 1;
            }
            tally
        })
    }

    /// `true` when nothing is out of range and no status bit is flagged
    pub fn is_healthy(&self) -> bool {
        self.out_of_range == 0 && self.flagged == 0
    }
}
