//! # ETC Link Protocol
//!
//! Codec for the ETC board UART link: packet profiles and field registries,
//! checksum rules, frame synchronization, telemetry decoding, range
//! classification and command encoding.

pub mod checksum;
pub mod classifier;
pub mod decoder;
pub mod encoder;
pub mod profile;
pub mod profiles;
pub mod registry;
pub mod scanner;
pub mod status;

pub use classifier::{classify, Classification, Tally};
pub use decoder::{decode, InterpretedValue, RawValue, Record};
pub use encoder::{encode, encode_toggle, CommandFrame, ControlState, Leds, SenseMode, ZeroizeCode};
pub use profile::{PacketProfile, ProfileVersion};
pub use scanner::{Frame, FrameScanner, ScannerStats};
pub use status::BoardStatus;
