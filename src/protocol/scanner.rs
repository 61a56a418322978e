//! # Frame Scanner
//!
//! Recovers checksum-valid telemetry frames from an arbitrarily chunked byte
//! stream.
//!
//! The transport hands over whatever it read; frames may straddle reads,
//! arrive several at a time, or be preceded by line noise. The scanner keeps
//! every byte that could still belong to a frame in an explicit buffer and
//! only discards bytes that provably cannot start one.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, trace};

use super::checksum;
use super::profile::{PacketProfile, ProfileVersion};

/// One complete, checksum-valid frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    profile_version: ProfileVersion,
}

impl Frame {
    pub(crate) fn new(bytes: Bytes, profile_version: ProfileVersion) -> Self {
        Self {
            bytes,
            profile_version,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn profile_version(&self) -> ProfileVersion {
        self.profile_version
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Running counters of a scanner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScannerStats {
    /// Frames emitted
    pub frames: u64,
    /// Header matches rejected by the checksum
    pub checksum_failures: u64,
    /// Bytes dropped while hunting for a header
    pub discarded_bytes: u64,
}

/// Stateful frame synchronizer for one profile
#[derive(Debug)]
pub struct FrameScanner {
    profile: Arc<PacketProfile>,
    buffer: BytesMut,
    stats: ScannerStats,
}

impl FrameScanner {
    pub fn new(profile: Arc<PacketProfile>) -> Self {
        let capacity = profile.frame_length() * 2;
        Self {
            profile,
            buffer: BytesMut::with_capacity(capacity),
            stats: ScannerStats::default(),
        }
    }

    /// Append `data` and extract every complete frame now available
    ///
    /// Frames are returned in stream order. An empty result only means no
    /// frame is complete yet; unconsumed bytes stay buffered for the next
    /// call.
    ///
    /// # Examples
    ///
    /// ```
    /// use etc_monitor::protocol::profiles::builtin;
    /// use etc_monitor::protocol::profile::ProfileVersion;
    /// use etc_monitor::protocol::scanner::FrameScanner;
    ///
    /// let profile = builtin(ProfileVersion::B).unwrap();
    /// let mut scanner = FrameScanner::new(profile);
    /// assert!(scanner.feed(&[0x00, 0x41, 0x56]).is_empty());
    /// assert_eq!(scanner.pending(), &[0x41, 0x56]);
    /// ```
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let frame_length = self.profile.frame_length();
        let rule = self.profile.checksum_rule();
        let mut frames = Vec::new();
        let mut cursor = 0;

        loop {
            let Some(start) = self.find_header(cursor) else {
                self.drop_unmatched(cursor);
                break;
            };

            if self.buffer.len() - start < frame_length {
                // Candidate is incomplete; wait for more bytes.
                self.discard(start);
                break;
            }

            let window = &self.buffer[start..start + frame_length];
            match checksum::verify(rule, window) {
                Ok(()) => {
                    self.discard(start);
                    let bytes = self.buffer.split_to(frame_length).freeze();
                    frames.push(Frame::new(bytes, self.profile.version()));
                    self.stats.frames += 1;
                    cursor = 0;
                }
                Err(e) => {
                    debug!("Discarding candidate frame at buffer offset {}: {}", start, e);
                    self.stats.checksum_failures += 1;
                    cursor = start + 1;
                }
            }
        }

        if !frames.is_empty() {
            trace!(
                "Extracted {} frame(s), {} byte(s) pending",
                frames.len(),
                self.buffer.len()
            );
        }

        frames
    }

    /// Bytes received but not yet consumed by a frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop all buffered bytes (after a disconnect)
    pub fn reset(&mut self) {
        self.stats.discarded_bytes += self.buffer.len() as u64;
        self.buffer.clear();
    }

    pub fn stats(&self) -> ScannerStats {
        self.stats
    }

    pub fn profile(&self) -> &Arc<PacketProfile> {
        &self.profile
    }

    /// Buffer offset of the first full header match at or after `from`
    fn find_header(&self, from: usize) -> Option<usize> {
        let header = self.profile.header_bytes();
        self.buffer
            .get(from..)?
            .windows(header.len())
            .position(|w| w == header)
            .map(|pos| from + pos)
    }

    /// No header after `cursor`: keep only a trailing partial header match
    fn drop_unmatched(&mut self, cursor: usize) {
        let header = self.profile.header_bytes();
        let len = self.buffer.len();
        let keep_from = (cursor..len)
            .find(|&i| len - i < header.len() && header.starts_with(&self.buffer[i..]))
            .unwrap_or(len);
        self.discard(keep_from);
    }

    fn discard(&mut self, count: usize) {
        if count > 0 {
            self.stats.discarded_bytes += count as u64;
            self.buffer.advance(count);
        }
    }
}
