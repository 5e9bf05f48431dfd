//! Stream transport abstraction and the TCP implementation.
//!
//! [`Transport`] opens one authenticated connection per call and hands back
//! a [`FrameSource`] that yields decoded frames in wire order. Providers
//! handle their own timing internally; the session layer owns ordering
//! validation and state, the transport owns bytes.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use crate::error::{RecorderError, Result};
use crate::types::{Frame, Token};
use crate::wire::{self, HandshakeStatus, RecordHeader, RecordKind, RECORD_HEADER_LEN};

/// Ordered source of decoded frames from one live connection.
///
/// Returns:
/// - `Ok(Some(frame))` — next frame in wire order
/// - `Ok(None)` — the peer closed the stream cleanly
/// - `Err(e)` — transport loss, auth expiry, or decode failure
#[async_trait::async_trait]
pub trait FrameSource: Send + std::fmt::Debug + 'static {
    async fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens authenticated frame connections to a camera resource.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, camera_id: &str, token: &Token) -> Result<Box<dyn FrameSource>>;
}

/// TCP transport speaking the handshake + framed-record protocol.
pub struct TcpTransport {
    endpoint: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// `endpoint` is `host:port` of the camera stream service.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Self {
        Self { endpoint: endpoint.into(), connect_timeout }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, camera_id: &str, token: &Token) -> Result<Box<dyn FrameSource>> {
        debug!(endpoint = %self.endpoint, camera_id, "Connecting to stream service");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| RecorderError::Timeout { duration: self.connect_timeout })?
            .map_err(|e| {
                RecorderError::connect_failed_with_source(
                    format!("tcp connect to {} failed", self.endpoint),
                    Box::new(e),
                )
            })?;

        let mut stream = stream;
        let handshake = wire::encode_handshake(camera_id, token.access_token());

        let open = async {
            stream.write_all(&handshake).await.map_err(|e| {
                RecorderError::connect_failed_with_source("handshake write failed", Box::new(e))
            })?;
            let mut status = [0u8; 1];
            stream.read_exact(&mut status).await.map_err(|e| {
                RecorderError::connect_failed_with_source("handshake reply missing", Box::new(e))
            })?;
            Ok::<u8, RecorderError>(status[0])
        };

        let status = tokio::time::timeout(self.connect_timeout, open)
            .await
            .map_err(|_| RecorderError::Timeout { duration: self.connect_timeout })??;

        match HandshakeStatus::from_byte(status) {
            HandshakeStatus::Ok => {}
            HandshakeStatus::AuthRejected => {
                return Err(RecorderError::auth_failed("stream service rejected token"));
            }
            HandshakeStatus::Protocol(code) => {
                return Err(RecorderError::connect_failed(format!(
                    "stream service answered unexpected handshake status {code:#04x}"
                )));
            }
        }

        info!(endpoint = %self.endpoint, camera_id, "Stream connection established");
        Ok(Box::new(TcpFrameSource { reader: BufReader::new(stream) }))
    }
}

/// Frame source reading framed records off an accepted TCP connection.
#[derive(Debug)]
struct TcpFrameSource {
    reader: BufReader<TcpStream>,
}

#[async_trait::async_trait]
impl FrameSource for TcpFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut kind = [0u8; 1];
        if let Err(e) = self.reader.read_exact(&mut kind).await {
            // EOF without an end-of-stream record is an abrupt disconnect.
            return Err(RecorderError::disconnected(format!("connection lost: {e}")));
        }

        match RecordKind::from_byte(kind[0])? {
            RecordKind::EndOfStream => {
                debug!("Peer signalled end of stream");
                Ok(None)
            }
            RecordKind::AuthExpired => {
                Err(RecorderError::auth_failed("stream service reported token expiry"))
            }
            RecordKind::Frame => {
                let mut header_buf = [0u8; RECORD_HEADER_LEN];
                self.reader.read_exact(&mut header_buf).await.map_err(|e| {
                    RecorderError::disconnected(format!("connection lost mid-header: {e}"))
                })?;
                let header = RecordHeader::decode(&header_buf)?;

                let mut payload = vec![0u8; header.payload_len as usize];
                self.reader.read_exact(&mut payload).await.map_err(|e| {
                    RecorderError::disconnected(format!("connection lost mid-payload: {e}"))
                })?;

                trace!(
                    sequence = header.sequence,
                    len = header.payload_len,
                    "Frame record received"
                );

                Ok(Some(Frame {
                    sequence: header.sequence,
                    timestamp_micros: header.timestamp_micros,
                    payload: Bytes::from(payload),
                    end_of_stream: false,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    use crate::wire::HANDSHAKE_MAGIC;

    async fn serve_one(
        listener: TcpListener,
        status: u8,
        records: Vec<Vec<u8>>,
    ) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Drain the handshake before answering.
            let mut magic = [0u8; 4];
            socket.read_exact(&mut magic).await.unwrap();
            let mut len_buf = [0u8; 4];
            socket.read_exact(&mut len_buf).await.unwrap();
            let mut camera_id = vec![0u8; u32::from_le_bytes(len_buf) as usize];
            socket.read_exact(&mut camera_id).await.unwrap();
            socket.read_exact(&mut len_buf).await.unwrap();
            let mut token = vec![0u8; u32::from_le_bytes(len_buf) as usize];
            socket.read_exact(&mut token).await.unwrap();
            assert_eq!(&magic, HANDSHAKE_MAGIC);

            socket.write_all(&[status]).await.unwrap();
            for record in records {
                socket.write_all(&record).await.unwrap();
            }
            socket.flush().await.unwrap();
            camera_id
        })
    }

    fn frame_record(sequence: u64, payload: &[u8]) -> Vec<u8> {
        let header = RecordHeader {
            sequence,
            timestamp_micros: 1_000 + sequence,
            payload_len: payload.len() as u32,
        };
        let mut buf = vec![RecordKind::Frame.to_byte()];
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(payload);
        buf
    }

    fn fresh_token() -> Token {
        Token::new("tok", std::time::SystemTime::now() + Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn connects_and_reads_frames_until_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_one(
            listener,
            0,
            vec![
                frame_record(1, b"alpha"),
                frame_record(2, b"beta"),
                vec![RecordKind::EndOfStream.to_byte()],
            ],
        )
        .await;

        let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(2));
        let mut source = transport.connect("cam-1", &fresh_token()).await.unwrap();

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.payload.as_ref(), b"alpha");

        let second = source.next_frame().await.unwrap().unwrap();
        assert_eq!(second.sequence, 2);

        assert!(source.next_frame().await.unwrap().is_none());
        assert_eq!(server.await.unwrap(), b"cam-1");
    }

    #[tokio::test]
    async fn rejected_handshake_is_an_auth_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = serve_one(listener, 1, vec![]).await;

        let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(2));
        let err = transport.connect("cam-1", &fresh_token()).await.unwrap_err();
        assert!(matches!(err, RecorderError::Auth { .. }));
    }

    #[tokio::test]
    async fn abrupt_close_is_a_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Server sends one frame then drops the socket without an end record.
        let _server = serve_one(listener, 0, vec![frame_record(1, b"only")]).await;

        let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(2));
        let mut source = transport.connect("cam-1", &fresh_token()).await.unwrap();

        assert!(source.next_frame().await.unwrap().is_some());
        let err = source.next_frame().await.unwrap_err();
        assert!(matches!(err, RecorderError::Disconnected { .. }));
    }

    #[tokio::test]
    async fn auth_expired_record_surfaces_as_auth_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = serve_one(
            listener,
            0,
            vec![frame_record(1, b"x"), vec![RecordKind::AuthExpired.to_byte()]],
        )
        .await;

        let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(2));
        let mut source = transport.connect("cam-1", &fresh_token()).await.unwrap();

        assert!(source.next_frame().await.unwrap().is_some());
        let err = source.next_frame().await.unwrap_err();
        assert!(err.needs_token_refresh());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_retryable() {
        // Port 1 on localhost is essentially always closed.
        let transport = TcpTransport::new("127.0.0.1:1", Duration::from_secs(2));
        let err = transport.connect("cam-1", &fresh_token()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
