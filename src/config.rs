//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{EtcError, Result};
use crate::protocol::encoder::{ControlState, Leds, SenseMode, ZeroizeCode};
use crate::protocol::profile::ProfileVersion;
use crate::protocol::profiles::DISCRETE_OUTPUTS;
use crate::serial::SUPPORTED_BAUD_RATES;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long one poll waits for bytes
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Protocol generation spoken by the board
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    #[serde(default = "default_profile")]
    pub profile: ProfileVersion,
}

/// Initial control state
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControlConfig {
    #[serde(default)]
    pub sense_mode: SenseMode,

    /// Indices of discrete outputs to enable
    #[serde(default)]
    pub discrete_outputs: Vec<usize>,

    #[serde(default)]
    pub led_red: bool,

    #[serde(default)]
    pub led_green: bool,

    #[serde(default)]
    pub led_blue: bool,

    /// Send the control state once the port is open
    #[serde(default)]
    pub send_on_connect: bool,
}

/// Record rendering on stdout
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Jsonl,
}

/// Output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,

    /// Period of the status log line
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; console only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_read_buffer_size() -> usize { 1024 }

fn default_profile() -> ProfileVersion { ProfileVersion::B }

fn default_output_format() -> OutputFormat { OutputFormat::Text }
fn default_status_interval_ms() -> u64 { 5000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> EtcError {
    EtcError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use etc_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            let rates: Vec<String> = SUPPORTED_BAUD_RATES.iter().map(u32::to_string).collect();
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                rates.join(", ")
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        if self.serial.read_buffer_size == 0 || self.serial.read_buffer_size > 65536 {
            return Err(invalid("read_buffer_size must be between 1 and 65536"));
        }

        for &index in &self.control.discrete_outputs {
            if index >= DISCRETE_OUTPUTS {
                return Err(invalid(format!(
                    "discrete output index {} is out of bounds (must be 0-{})",
                    index,
                    DISCRETE_OUTPUTS - 1
                )));
            }
        }

        if self.output.status_interval_ms == 0 || self.output.status_interval_ms > 600000 {
            return Err(invalid("status_interval_ms must be between 1 and 600000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if matches!(&self.logging.dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging dir cannot be empty when set"));
        }

        Ok(())
    }

    /// Control state described by the `[control]` section
    pub fn control_state(&self) -> ControlState {
        ControlState {
            sense_mode: self.control.sense_mode,
            discrete_outputs: self.control.discrete_outputs.iter().copied().collect(),
            leds: Leds {
                red: self.control.led_red,
                green: self.control.led_green,
                blue: self.control.led_blue,
            },
            zeroize: ZeroizeCode::None,
        }
    }
}
