//! # ETC Monitor
//!
//! Watch an ETC test board over its UART link.
//!
//! Reads telemetry frames from the board, decodes them with the configured
//! protocol profile and prints one line per record on stdout. Diagnostics
//! go to stderr and, optionally, to a daily log file.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use etc_monitor::config::{Config, LoggingConfig, OutputFormat};
use etc_monitor::protocol::encoder::SenseMode;
use etc_monitor::protocol::profiles::builtin;
use etc_monitor::protocol::{PacketProfile, Record};
use etc_monitor::protocol::status::BoardStatus;
use etc_monitor::protocol::Tally;
use etc_monitor::serial::EtcSerial;
use etc_monitor::session::MonitorSession;
use etc_monitor::telemetry;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Install console logging on stderr, plus a daily file when configured
///
/// `RUST_LOG` overrides the configured level.
fn setup_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.parse().context("Invalid log level")?)
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "etc-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = &logging.dir {
        info!("Logging to directory: {}", dir);
    }

    Ok(guard)
}

/// Print `records` to `out` and flush; returns how many lines were written
///
/// Output failures are logged at debug level and never stop the monitor.
fn print_records<W: Write>(
    out: &mut W,
    format: OutputFormat,
    profile: &PacketProfile,
    records: &[Record],
    sense_mode: SenseMode,
) -> usize {
    let mut printed = 0;
    for record in records {
        let status = BoardStatus::summarize(profile, record, sense_mode);
        match telemetry::write_record(out, format, record, &status) {
            Ok(()) => printed += 1,
            Err(e) => debug!("Failed to print record: {}", e),
        }
    }
    if let Err(e) = out.flush() {
        debug!("Failed to flush stdout: {}", e);
    }
    printed
}

/// Main entry point for the ETC monitor
///
/// # Control Flow
///
/// 1. Load configuration (first argument, default `config/default.toml`;
///    built-in defaults when the default file is absent)
/// 2. Open the serial port and build the session for the configured profile
/// 3. Optionally send the configured control state once
/// 4. Poll the link every `poll_interval_ms`, print each record, log a
///    status line every `status_interval_ms`
/// 5. Exit on Ctrl+C
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))?,
        None => Config::default(),
    };

    let _guard = setup_logging(&config.logging)?;

    info!("ETC Monitor v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path),
        None => info!("Using configuration from {} or built-in defaults", DEFAULT_CONFIG_PATH),
    }

    let profile = builtin(config.protocol.profile)?;
    info!("Protocol profile {} ({}-byte frames)", profile.version(), profile.frame_length());

    let serial = EtcSerial::open(&config.serial.port, config.serial.baud_rate)?;
    info!("Serial port opened at: {}", serial.device_path());

    let mut session = MonitorSession::new(
        serial,
        profile,
        config.serial.read_buffer_size,
        Duration::from_millis(config.serial.timeout_ms),
    );

    let mut control = config.control_state();
    if config.control.send_on_connect {
        session.send_control(&mut control).await?;
        info!("Initial control state sent");
    }

    let mut poll_interval = interval(Duration::from_millis(config.serial.poll_interval_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status_interval = interval(Duration::from_millis(config.output.status_interval_ms));
    status_interval.tick().await;

    info!("Monitoring; press Ctrl+C to exit");

    let stdout = std::io::stdout();
    let mut records_seen: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                let records = match session.poll().await {
                    Ok(records) => records,
                    Err(e) => {
                        warn!("Read failed: {}", e);
                        session.reset();
                        continue;
                    }
                };

                let printed = print_records(
                    &mut stdout.lock(),
                    config.output.format,
                    session.profile(),
                    &records,
                    control.sense_mode,
                );
                if printed < records.len() {
                    debug!("Printed {} of {} record(s)", printed, records.len());
                }
                records_seen += records.len() as u64;
            }

            _ = status_interval.tick() => {
                let stats = session.stats();
                let tally = session.latest().map(Tally::of).unwrap_or_default();
                info!(
                    "Records: {} | checksum failures: {} | discarded bytes: {} | out of range: {} | flagged: {}",
                    records_seen, stats.checksum_failures, stats.discarded_bytes,
                    tally.out_of_range, tally.flagged
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total records decoded: {}", records_seen);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = Config::load(path).unwrap();
        assert!(config.validate().is_ok());
    }

    /// Sink that accepts writes but fails every flush
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed"))
        }
    }

    #[test]
    fn test_print_records_survives_flush_failure() {
        use etc_monitor::protocol::checksum::complement_checksum;
        use etc_monitor::protocol::decoder::decode_bytes;
        use etc_monitor::protocol::ProfileVersion;

        let profile = builtin(ProfileVersion::B).unwrap();
        let mut bytes = vec![0u8; 133];
        bytes[..4].copy_from_slice(&[0x41, 0x56, 0x85, 0x02]);
        bytes[132] = complement_checksum(&bytes[..132]);
        let record = decode_bytes(&profile, &bytes).unwrap();

        let mut out = FlushFails(Vec::new());
        let printed = print_records(
            &mut out,
            OutputFormat::Text,
            &profile,
            &[record.clone(), record],
            SenseMode::OpenGnd,
        );

        assert_eq!(printed, 2);
        assert_eq!(String::from_utf8(out.0).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_log_level_directive_parses() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let directive: std::result::Result<tracing_subscriber::filter::Directive, _> = level.parse();
            assert!(directive.is_ok(), "level {}", level);
        }
    }
}
