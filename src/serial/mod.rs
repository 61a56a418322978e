//! # Serial Communication Module
//!
//! Handles the UART link to the ETC board.
//!
//! This module handles:
//! - Opening the board's serial port (8N1, no flow control)
//! - Falling back to common USB-serial device paths
//! - Async reads of raw telemetry bytes
//! - Writing command frames

pub mod port_trait;

pub use port_trait::SerialPortIO;

use crate::error::{EtcError, Result};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Baud rates the board firmware can be configured for
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200];

/// Default baud rate of the board
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Device paths tried after the configured one (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (FTDI, CP210x)
    "/dev/ttyACM0", // USB CDC devices
];

/// ETC board serial port handler
pub struct EtcSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for EtcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl EtcSerial {
    /// Open the board's serial port
    ///
    /// Tries `preferred` first, then the default device paths.
    ///
    /// # Arguments
    ///
    /// * `preferred` - Configured device path (e.g., "/dev/ttyUSB1")
    /// * `baud_rate` - Line speed, one of [`SUPPORTED_BAUD_RATES`]
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::SerialPortNotFound`] listing every path tried
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use etc_monitor::serial::EtcSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = EtcSerial::open("/dev/ttyUSB0", 115_200)?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(preferred: &str, baud_rate: u32) -> Result<Self> {
        let mut paths = vec![preferred];
        paths.extend(DEFAULT_DEVICE_PATHS.iter().filter(|&&p| p != preferred));
        Self::open_with_paths(&paths, baud_rate)
    }

    /// Open the first device in `paths` that accepts the connection
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line speed
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened ETC board link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(EtcError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| EtcError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl SerialPortIO for EtcSerial {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
        assert!(SUPPORTED_BAUD_RATES.contains(&DEFAULT_BAUD_RATE));
        assert_eq!(DEFAULT_DEVICE_PATHS, &["/dev/ttyUSB0", "/dev/ttyACM0"]);
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = EtcSerial::open_with_paths(invalid_paths, DEFAULT_BAUD_RATE);

        match result {
            Err(EtcError::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        match EtcSerial::open_with_paths(empty_paths, DEFAULT_BAUD_RATE) {
            Err(EtcError::SerialPortNotFound(_)) => {}
            other => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = EtcSerial::open_port("/dev/nonexistent_serial_device_12345", 9600);

        match result {
            Err(EtcError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_lists_preferred_path_first() {
        match EtcSerial::open("/dev/nonexistent_etc_board", DEFAULT_BAUD_RATE) {
            Err(EtcError::SerialPortNotFound(msg)) => {
                assert!(msg.starts_with("/dev/nonexistent_etc_board"));
            }
            // A real adapter on a default path is fine too.
            Ok(serial) => assert_ne!(serial.device_path(), "/dev/nonexistent_etc_board"),
            Err(other) => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    // Only meaningful with an ETC board attached
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_read_with_real_hardware() {
        if let Ok(mut serial) = EtcSerial::open("/dev/ttyUSB0", DEFAULT_BAUD_RATE) {
            let mut buf = [0u8; 256];
            let read = tokio::time::timeout(
                std::time::Duration::from_millis(500),
                serial.read(&mut buf),
            )
            .await;
            println!("Read result from {}: {:?}", serial.device_path(), read);
        } else {
            println!("No ETC board detected (skipping read test)");
        }
    }
}
