//! # Error Types
//!
//! Custom error types for the ETC monitor using `thiserror`.

use thiserror::Error;

/// Main error type for the ETC monitor
#[derive(Debug, Error)]
pub enum EtcError {
    /// Malformed packet profile or field registry (start-up, fatal)
    #[error("Profile error: {0}")]
    Profile(String),

    /// Candidate frame failed its checksum rule
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Frame handed to the wrong profile or with the wrong length
    #[error("Frame error: {0}")]
    Frame(String),

    /// Control state cannot be encoded with the selected profile
    #[error("Encode state error: {0}")]
    EncodeState(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Record serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the ETC monitor
pub type Result<T> = std::result::Result<T, EtcError>;
