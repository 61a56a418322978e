//! # Telemetry Module
//!
//! Renders decoded records for the operator.
//!
//! This module handles:
//! - Formatting a record as one JSON line (JSONL)
//! - Formatting a one-line text summary
//! - Writing either to any `io::Write` sink (stdout in the binary)

use std::io::Write;

use chrono::{DateTime, Local, SecondsFormat};
use serde_json::json;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::protocol::classifier::Tally;
use crate::protocol::decoder::Record;
use crate::protocol::status::BoardStatus;

/// Render `record` as a single JSON object (no trailing newline)
///
/// # Errors
///
/// Returns [`crate::error::EtcError::Serialization`] if serialization fails.
pub fn render_json(record: &Record, status: &BoardStatus, at: DateTime<Local>) -> Result<String> {
    let values: Vec<serde_json::Value> = record
        .iter()
        .map(|(offset, value)| {
            json!({
                "offset": offset,
                "name": value.name,
                "raw": value.raw,
                "display": value.display,
                "is_error": value.is_error,
                "classification": value.classification,
            })
        })
        .collect();

    let line = json!({
        "ts": at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "profile": record.profile_version,
        "status": status,
        "tally": Tally::of(record),
        "values": values,
    });
    Ok(serde_json::to_string(&line)?)
}

/// One-line text summary: indicators, verdict counts and offending fields
pub fn render_text(record: &Record, status: &BoardStatus, at: DateTime<Local>) -> String {
    let tally = Tally::of(record);
    let mut line = format!(
        "{} [{}] {} | valid={} out_of_range={} flagged={}",
        at.format("%H:%M:%S%.3f"),
        record.profile_version,
        status,
        tally.valid + tally.fixed,
        tally.out_of_range,
        tally.flagged
    );

    let problems: Vec<String> = record
        .out_of_range()
        .chain(record.flagged())
        .map(|(_, value)| format!("{}={}", value.name, value.display))
        .collect();
    if !problems.is_empty() {
        line.push_str(" | ");
        line.push_str(&problems.join(", "));
    }
    line
}

/// Write `record` to `out` in `format`, newline terminated
///
/// # Errors
///
/// Returns error if rendering or writing fails.
pub fn write_record<W: Write>(
    out: &mut W,
    format: OutputFormat,
    record: &Record,
    status: &BoardStatus,
) -> Result<()> {
    let now = Local::now();
    let line = match format {
        OutputFormat::Jsonl => render_json(record, status, now)?,
        OutputFormat::Text => render_text(record, status, now),
    };
    writeln!(out, "{}", line)?;
    Ok(())
}
