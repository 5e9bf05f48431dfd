//! Stream session: one authenticated connection producing ordered frames.
//!
//! A [`StreamSession`] owns a single [`FrameSource`] and turns it into a
//! strictly ordered frame sequence with explicit lifecycle state. Sequence
//! violations fail the stream closed rather than silently gapping the
//! recording. Cancellation unblocks a suspended [`StreamSession::next_frame`]
//! promptly via the session's [`CancellationToken`].

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::transport::{FrameSource, Transport};
use crate::types::{CameraDescriptor, FailureKind, Frame, SessionState, Token};

/// One live stream session against a camera resource.
#[derive(Debug)]
pub struct StreamSession {
    source: Option<Box<dyn FrameSource>>,
    state_tx: watch::Sender<SessionState>,
    cancel: CancellationToken,
    last_sequence: Option<u64>,
    finished: bool,
}

impl StreamSession {
    /// Open an authenticated session against `camera`.
    ///
    /// `resume_after` carries the last known sequence number across
    /// reconnects: the first delivered frame must then be exactly
    /// `resume_after + 1`, so ordering validation spans the whole recording
    /// rather than one connection.
    ///
    /// Fails with an auth error when the token is already expired (the
    /// caller must refresh first) and with a retryable connect error on
    /// transport setup failure.
    pub async fn open(
        transport: &dyn Transport,
        camera: &CameraDescriptor,
        token: &Token,
        resume_after: Option<u64>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if token.is_expired() {
            return Err(RecorderError::auth_failed("token expired before connect"));
        }

        // send_replace publishes even while no receiver is subscribed, so
        // state() stays truthful for callers that never subscribe.
        let (state_tx, _) = watch::channel(SessionState::Idle);
        state_tx.send_replace(SessionState::Connecting);
        debug!(camera_id = %camera.id, ?resume_after, "Opening stream session");

        let source = tokio::select! {
            _ = cancel.cancelled() => return Err(RecorderError::Cancelled),
            result = transport.connect(&camera.id, token) => result?,
        };

        state_tx.send_replace(SessionState::Streaming);
        info!(camera_id = %camera.id, "Stream session streaming");

        Ok(Self {
            source: Some(source),
            state_tx,
            cancel,
            last_sequence: resume_after,
            finished: false,
        })
    }

    /// Wait for the next frame.
    ///
    /// Returns `Ok(None)` once the peer ends the stream cleanly. Suspends
    /// until a frame arrives, the stream ends, an error occurs, or the
    /// session is cancelled; cancellation returns [`RecorderError::Cancelled`]
    /// promptly.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let Some(source) = self.source.as_mut() else {
            return Err(RecorderError::Cancelled);
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(RecorderError::Cancelled),
            result = source.next_frame() => result,
        };

        match result {
            Ok(Some(frame)) => {
                if let Some(last) = self.last_sequence {
                    let expected = last + 1;
                    if frame.sequence != expected {
                        let details = format!(
                            "expected sequence {expected}, received {}",
                            frame.sequence
                        );
                        warn!(%details, "Frame ordering violated, failing stream closed");
                        self.state_tx.send_replace(SessionState::Failed(FailureKind::FrameIntegrity));
                        return Err(RecorderError::frame_integrity(details));
                    }
                }
                self.last_sequence = Some(frame.sequence);

                if frame.end_of_stream {
                    self.finished = true;
                    self.state_tx.send_replace(SessionState::Draining);
                }
                Ok(Some(frame))
            }
            Ok(None) => {
                debug!(last_sequence = ?self.last_sequence, "Stream ended cleanly");
                self.finished = true;
                self.state_tx.send_replace(SessionState::Draining);
                Ok(None)
            }
            Err(e) => {
                let kind = match &e {
                    RecorderError::Auth { .. } => FailureKind::AuthExpired,
                    RecorderError::FrameIntegrity { .. } => FailureKind::FrameIntegrity,
                    _ => FailureKind::Disconnected,
                };
                self.state_tx.send_replace(SessionState::Failed(kind));
                Err(e)
            }
        }
    }

    /// Close the session and release the connection.
    ///
    /// Idempotent; always transitions to `Closed`. A concurrent
    /// [`cancel_handle`](Self::cancel_handle) cancel unblocks a suspended
    /// `next_frame` first.
    pub fn close(&mut self) {
        if self.source.is_some() || !matches!(self.state(), SessionState::Closed) {
            self.cancel.cancel();
            self.source = None;
            self.state_tx.send_replace(SessionState::Closed);
            debug!("Stream session closed");
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Stream of state transitions (yields the current state immediately).
    pub fn state_updates(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    /// Token that cancels this session from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sequence number of the last frame delivered, if any.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Unblock anything still waiting on this session's token.
        self.cancel.cancel();
    }
}
