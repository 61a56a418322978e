//! Monitor session driven over a scripted transport

mod common;

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use etc_monitor::error::EtcError;
use etc_monitor::serial::SerialPortIO;
use etc_monitor::session::MonitorSession;

/// Transport replaying fixed read chunks and recording writes
#[derive(Default)]
struct ScriptedPort {
    reads: VecDeque<Vec<u8>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedPort {
    fn with_reads(reads: Vec<Vec<u8>>) -> Self {
        Self {
            reads: reads.into(),
            writes: Arc::default(),
        }
    }

    /// Handle on the frames written so far, usable after the port moves
    fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.writes)
    }
}

#[async_trait]
impl SerialPortIO for ScriptedPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Transport whose reads never complete
struct SilentPort;

#[async_trait]
impl SerialPortIO for SilentPort {
    async fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        std::future::pending().await
    }

    async fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session<P: SerialPortIO>(port: P, version: ProfileVersion) -> MonitorSession<P> {
    MonitorSession::new(port, builtin(version).unwrap(), 512, Duration::from_millis(20))
}

#[tokio::test]
async fn test_records_arrive_in_order_across_reads() {
    let first = telemetry_frame(&[(90, 1)]);
    let second = telemetry_frame(&[(90, 2)]);

    let mut stream = noise(30, 5);
    stream.extend_from_slice(&first);
    stream.extend_from_slice(&second);
    let reads = stream.chunks(45).map(<[u8]>::to_vec).collect::<Vec<_>>();
    let polls = reads.len();

    let mut session = session(ScriptedPort::with_reads(reads), ProfileVersion::B);
    let mut records = Vec::new();
    for _ in 0..polls {
        records.extend(session.poll().await.unwrap());
    }

    let marks: Vec<_> = records.iter().map(|r| r.raw(90)).collect();
    assert_eq!(marks, vec![Some(1), Some(2)]);
    assert_eq!(session.latest().unwrap().raw(90), Some(2));
    assert_eq!(session.stats().discarded_bytes, 30);
}

#[tokio::test]
async fn test_poll_times_out_quietly() {
    let mut session = session(SilentPort, ProfileVersion::B);
    let records = session.poll().await.unwrap();
    assert!(records.is_empty());
    assert!(session.latest().is_none());
}

#[tokio::test]
async fn test_zeroize_sent_once() {
    let port = ScriptedPort::default();
    let written = port.written();
    let mut session = session(port, ProfileVersion::B);
    let mut state = ControlState {
        zeroize: ZeroizeCode::AllSata,
        ..Default::default()
    };

    session.send_control(&mut state).await.unwrap();
    session.send_control(&mut state).await.unwrap();
    assert_eq!(state.zeroize, ZeroizeCode::None);
    assert_eq!(session.commands_sent(), 2);

    let frames = written.lock().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(&frames[0][6..8], &[0xBB, 0x44]);
    assert_eq!(&frames[1][6..8], &[0x00, 0x00]);
}

#[tokio::test]
async fn test_toggle_zeroize_follows_outputs() {
    let port = ScriptedPort::default();
    let written = port.written();
    let mut session = session(port, ProfileVersion::A);
    let mut state = ControlState {
        zeroize: ZeroizeCode::Sata1,
        ..Default::default()
    };

    session.send_control(&mut state).await.unwrap();
    assert_eq!(state.zeroize, ZeroizeCode::None);

    let frames = written.lock().unwrap();
    let commands: Vec<u8> = frames.iter().map(|f| f[3]).collect();
    assert_eq!(commands, vec![0x10, 0x11, 0x12, 0x13, 0x20, 0x21, 0x22, 0x30]);
    assert_eq!(frames[7][4], 0x02);
}

#[tokio::test]
async fn test_snapshot_rejected_output_surfaces() {
    let mut session = session(ScriptedPort::default(), ProfileVersion::B);
    let mut state = ControlState::default();
    state.set_output(5, true);

    let result = session.send_control(&mut state).await;
    assert!(matches!(result, Err(EtcError::EncodeState(_))));
}
