//! # ETC Monitor Library
//!
//! Frame codec and field-interpretation engine for the ETC test board UART link.
//!
//! This library synchronizes 133-byte telemetry frames out of an unaligned
//! serial byte stream, validates their checksums, decodes the register bytes
//! into calibrated readings and status flags through a versioned field
//! registry, and builds the outbound command frames that drive the board's
//! LEDs, discrete outputs and SATA zeroize lines.

pub mod config;
pub mod error;
pub mod protocol;
pub mod serial;
pub mod session;
pub mod telemetry;
