//! Record and handshake codec shared by the network transport and the
//! on-disk recording format.
//!
//! ## Record layout
//!
//! Every frame is encoded as a fixed 20-byte header followed by the raw
//! payload, all little-endian:
//!
//! ```text
//! offset  0  sequence         u64
//! offset  8  timestamp_micros u64
//! offset 16  payload_len      u32
//! offset 20  payload          payload_len bytes
//! ```
//!
//! The recording file is a plain concatenation of these records. On the
//! wire each record is preceded by a one-byte record kind so that the
//! service can signal end-of-stream and auth expiry in-band.
//!
//! ## Handshake
//!
//! The client opens a connection with `MAGIC` followed by the camera id and
//! bearer token, each as a u32 length prefix plus UTF-8 bytes. The service
//! answers with a single status byte before any records flow.

use crate::error::{RecorderError, Result};
use crate::types::Frame;

/// Magic bytes opening the stream handshake.
pub const HANDSHAKE_MAGIC: &[u8; 4] = b"CSB1";

/// Size of the fixed record header in bytes.
pub const RECORD_HEADER_LEN: usize = 20;

/// Sanity limit on a single frame payload. Anything larger is treated as a
/// decode failure rather than an allocation request.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Record kind byte preceding each wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A frame record: header and payload follow.
    Frame,
    /// Clean end-of-stream; nothing follows.
    EndOfStream,
    /// The service rejected the token mid-stream; nothing follows.
    AuthExpired,
}

impl RecordKind {
    pub fn to_byte(self) -> u8 {
        match self {
            RecordKind::Frame => 0,
            RecordKind::EndOfStream => 1,
            RecordKind::AuthExpired => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(RecordKind::Frame),
            1 => Ok(RecordKind::EndOfStream),
            2 => Ok(RecordKind::AuthExpired),
            other => {
                Err(RecorderError::frame_integrity(format!("unknown record kind {other:#04x}")))
            }
        }
    }
}

/// Status byte answered by the service after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Ok,
    AuthRejected,
    Protocol(u8),
}

impl HandshakeStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => HandshakeStatus::Ok,
            1 => HandshakeStatus::AuthRejected,
            other => HandshakeStatus::Protocol(other),
        }
    }
}

/// Fixed-size record header preceding each frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub sequence: u64,
    pub timestamp_micros: u64,
    pub payload_len: u32,
}

impl RecordHeader {
    /// Build the header for a frame.
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            sequence: frame.sequence,
            timestamp_micros: frame.timestamp_micros,
            payload_len: frame.payload.len() as u32,
        }
    }

    /// Encode into the fixed 20-byte little-endian layout.
    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        buf[0..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp_micros.to_le_bytes());
        buf[16..20].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Decode from the fixed 20-byte layout, validating the payload length
    /// against [`MAX_PAYLOAD_LEN`].
    pub fn decode(buf: &[u8; RECORD_HEADER_LEN]) -> Result<Self> {
        let sequence = u64::from_le_bytes(buf[0..8].try_into().expect("slice is 8 bytes"));
        let timestamp_micros = u64::from_le_bytes(buf[8..16].try_into().expect("slice is 8 bytes"));
        let payload_len = u32::from_le_bytes(buf[16..20].try_into().expect("slice is 4 bytes"));

        if payload_len > MAX_PAYLOAD_LEN {
            return Err(RecorderError::frame_integrity(format!(
                "payload length {payload_len} exceeds limit {MAX_PAYLOAD_LEN}"
            )));
        }

        Ok(Self { sequence, timestamp_micros, payload_len })
    }
}

/// Encode the client handshake: magic, camera id, bearer token.
pub fn encode_handshake(camera_id: &str, token: &str) -> Vec<u8> {
    let mut buf =
        Vec::with_capacity(HANDSHAKE_MAGIC.len() + 8 + camera_id.len() + token.len());
    buf.extend_from_slice(HANDSHAKE_MAGIC);
    buf.extend_from_slice(&(camera_id.len() as u32).to_le_bytes());
    buf.extend_from_slice(camera_id.as_bytes());
    buf.extend_from_slice(&(token.len() as u32).to_le_bytes());
    buf.extend_from_slice(token.as_bytes());
    buf
}
