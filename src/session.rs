//! # Monitor Session
//!
//! Owns everything one link needs: the transport, the active profile, the
//! frame scanner with its leftover bytes, and the most recent record.
//!
//! A session is driven by its caller: [`MonitorSession::poll`] pulls one read
//! worth of bytes through the codec, [`MonitorSession::send_control`] pushes
//! the control state out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{EtcError, Result};
use crate::protocol::decoder::{decode, Record};
use crate::protocol::encoder::{encode, encode_toggle_state, CommandFrame, ControlState};
use crate::protocol::profile::{CommandLayout, PacketProfile};
use crate::protocol::scanner::{FrameScanner, ScannerStats};
use crate::serial::SerialPortIO;

/// Live link to one board
pub struct MonitorSession<P: SerialPortIO> {
    port: P,
    scanner: FrameScanner,
    read_buffer: Vec<u8>,
    read_timeout: Duration,
    latest: Option<Record>,
    commands_sent: u64,
}

impl<P: SerialPortIO> std::fmt::Debug for MonitorSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("profile", &self.scanner.profile().version())
            .field("stats", &self.scanner.stats())
            .field("commands_sent", &self.commands_sent)
            .finish_non_exhaustive()
    }
}

impl<P: SerialPortIO> MonitorSession<P> {
    /// Create a session over `port`
    ///
    /// # Arguments
    ///
    /// * `port` - Open transport
    /// * `profile` - Protocol generation the board speaks
    /// * `read_buffer_size` - Upper bound of bytes taken per poll
    /// * `read_timeout` - How long one poll waits for bytes
    pub fn new(
        port: P,
        profile: Arc<PacketProfile>,
        read_buffer_size: usize,
        read_timeout: Duration,
    ) -> Self {
        Self {
            port,
            scanner: FrameScanner::new(profile),
            read_buffer: vec![0u8; read_buffer_size.max(1)],
            read_timeout,
            latest: None,
            commands_sent: 0,
        }
    }

    /// Read once, then decode every frame completed by the new bytes
    ///
    /// Returns the records in arrival order; an empty vector means no frame
    /// completed during this poll. The last record is also kept as
    /// [`MonitorSession::latest`].
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::Serial`] if the transport read fails.
    pub async fn poll(&mut self) -> Result<Vec<Record>> {
        let read = tokio::time::timeout(self.read_timeout, self.port.read(&mut self.read_buffer)).await;

        let n = match read {
            Err(_elapsed) => return Ok(Vec::new()),
            Ok(result) => {
                result.map_err(|e| EtcError::Serial(format!("Failed to read from port: {}", e)))?
            }
        };
        if n == 0 {
            return Ok(Vec::new());
        }

        let profile = Arc::clone(self.scanner.profile());
        let frames = self.scanner.feed(&self.read_buffer[..n]);

        let mut records = Vec::with_capacity(frames.len());
        for frame in frames {
            match decode(&profile, frame) {
                Ok(record) => records.push(record),
                // Scanner frames always match their own profile.
                Err(e) => warn!("Dropping undecodable frame: {}", e),
            }
        }

        if let Some(last) = records.last() {
            debug!("Decoded {} record(s) from {} byte(s)", records.len(), n);
            self.latest = Some(last.clone());
        }

        Ok(records)
    }

    /// Encode `state`, write it out and clear its one-shot fields
    ///
    /// Snapshot profiles get one frame carrying the whole state; toggle
    /// profiles get one frame per output and LED, followed by the SATA
    /// zeroize frame when one is pending. The zeroize code is cleared
    /// only after every frame was written and flushed.
    ///
    /// # Errors
    ///
    /// Returns [`EtcError::EncodeState`] if the state cannot be encoded, or
    /// [`EtcError::Serial`] if the write fails. `state` is left untouched on
    /// error.
    pub async fn send_control(&mut self, state: &mut ControlState) -> Result<()> {
        let profile = self.scanner.profile();
        let frames: Vec<CommandFrame> = match profile.command() {
            CommandLayout::Snapshot { .. } => vec![encode(profile, state)?],
            CommandLayout::Toggle { .. } => encode_toggle_state(profile, state)?,
        };

        for frame in &frames {
            self.port
                .write_all(frame.as_bytes())
                .await
                .map_err(|e| EtcError::Serial(format!("Failed to write command: {}", e)))?;
            debug!("Sent command frame: {}", frame.to_hex());
        }

        self.port
            .flush()
            .await
            .map_err(|e| EtcError::Serial(format!("Failed to flush serial port: {}", e)))?;

        self.commands_sent += frames.len() as u64;
        state.clear_one_shot();
        Ok(())
    }

    /// Record decoded from the most recent frame
    pub fn latest(&self) -> Option<&Record> {
        self.latest.as_ref()
    }

    pub fn stats(&self) -> ScannerStats {
        self.scanner.stats()
    }

    /// Command frames written so far
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    pub fn profile(&self) -> &Arc<PacketProfile> {
        self.scanner.profile()
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending(&self) -> &[u8] {
        self.scanner.pending()
    }

    /// Forget buffered bytes and the latest record
    pub fn reset(&mut self) {
        self.scanner.reset();
        self.latest = None;
    }
}
