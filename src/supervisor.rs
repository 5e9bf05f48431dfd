//! Session supervisor: lifecycle orchestration and failure recovery.
//!
//! The supervisor owns the retry policy. Stream sessions and the sink
//! report typed failures upward; only this layer decides between token
//! refresh, reconnect with backoff, and terminal failure. The sink is
//! started once and survives reconnects so the output file stays
//! continuous, with new frames appending after the last durable sequence
//! number.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialProvider;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::session::StreamSession;
use crate::sink::{FrameSink, SubmitOutcome};
use crate::transport::Transport;
use crate::types::{CameraDescriptor, RecordingSummary, SupervisorState, Token};

/// Orchestrates one recording: session lifecycle, token refresh, reconnect
/// policy, backpressure and shutdown coordination.
pub struct Supervisor {
    config: RecorderConfig,
    credentials: Box<dyn CredentialProvider>,
    transport: Box<dyn Transport>,
    camera: CameraDescriptor,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(
        config: RecorderConfig,
        credentials: Box<dyn CredentialProvider>,
        transport: Box<dyn Transport>,
        camera: CameraDescriptor,
    ) -> Result<Self> {
        config.validate()?;
        let (state_tx, _) = watch::channel(SupervisorState::Starting);
        Ok(Self { config, credentials, transport, camera, state_tx })
    }

    /// Current supervisor state.
    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    /// Stream of state transitions (yields the current state immediately).
    ///
    /// Subscribe before calling [`Supervisor::run`]; the stream stays valid
    /// for the whole run.
    pub fn state_updates(&self) -> WatchStream<SupervisorState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    fn set_state(&self, state: SupervisorState) {
        if *self.state_tx.borrow() != state {
            debug!(?state, "Supervisor state");
            // send_replace publishes even with zero subscribers, so
            // state() stays truthful for callers that never subscribe.
            self.state_tx.send_replace(state);
        }
    }

    /// Run the recording to completion.
    ///
    /// Returns the summary on clean completion (end of stream, configured
    /// record duration reached, or cancellation). Every terminal failure is
    /// wrapped as [`RecorderError::SessionFailed`] carrying the last durably
    /// written sequence number, after a best-effort drain of already
    /// accepted frames.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RecordingSummary> {
        self.set_state(SupervisorState::Starting);
        info!(camera_id = %self.camera.id, destination = %self.config.destination.display(),
            "Starting recording");

        let mut sink =
            match FrameSink::start(&self.config.destination, self.config.queue_capacity).await {
                Ok(sink) => sink,
                Err(e) => {
                    self.set_state(SupervisorState::FailedTerminal);
                    return Err(RecorderError::session_failed(None, e));
                }
            };

        match self.pump(&cancel, &mut sink).await {
            Ok(()) => {
                self.set_state(SupervisorState::Stopping);
                match sink.finish().await {
                    Ok(report) => {
                        self.set_state(SupervisorState::Stopped);
                        info!(frames = report.frames_written, "Recording stopped");
                        Ok(RecordingSummary {
                            frames_written: report.frames_written,
                            bytes_written: report.bytes_written,
                            last_sequence: report.last_sequence,
                        })
                    }
                    Err(e) => {
                        self.set_state(SupervisorState::FailedTerminal);
                        Err(RecorderError::session_failed(sink.last_durable(), e))
                    }
                }
            }
            Err(e) => {
                self.set_state(SupervisorState::FailedTerminal);
                error!(error = %e, "Recording failed terminally");
                // Best-effort drain of accepted frames; the original error
                // stays authoritative.
                if let Err(finish_err) = sink.finish().await {
                    warn!(error = %finish_err, "Best-effort finish also failed");
                }
                Err(RecorderError::session_failed(sink.last_durable(), e))
            }
        }
    }

    /// Connect/ingest/reconnect loop. `Ok(())` means a clean stop:
    /// end-of-stream, deadline, or cancellation.
    async fn pump(&mut self, cancel: &CancellationToken, sink: &mut FrameSink) -> Result<()> {
        let mut token = self.credentials.token().await?;
        let deadline = self.config.record_duration().map(|d| tokio::time::Instant::now() + d);
        let mut attempts: u32 = 0;
        let mut resume: Option<u64> = None;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    info!("Configured record duration reached");
                    return Ok(());
                }
            }

            if token.is_expired() {
                debug!("Token expired before connect, refreshing");
                token = self.credentials.refresh(&token).await?;
            }

            let mut session = match StreamSession::open(
                self.transport.as_ref(),
                &self.camera,
                &token,
                resume,
                cancel.child_token(),
            )
            .await
            {
                Ok(session) => session,
                Err(RecorderError::Cancelled) => return Ok(()),
                Err(e) => {
                    self.recover(e, &mut token, &mut attempts, cancel).await?;
                    continue;
                }
            };

            self.set_state(SupervisorState::Running);

            let outcome =
                self.ingest(cancel, deadline, &mut session, sink, &mut resume, &mut attempts).await;
            session.close();

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => self.recover(e, &mut token, &mut attempts, cancel).await?,
            }
        }
    }

    /// Pull frames from one session into the sink until the stream ends,
    /// the deadline hits, cancellation fires, or the session fails.
    async fn ingest(
        &mut self,
        cancel: &CancellationToken,
        deadline: Option<tokio::time::Instant>,
        session: &mut StreamSession,
        sink: &mut FrameSink,
        resume: &mut Option<u64>,
        attempts: &mut u32,
    ) -> Result<()> {
        loop {
            let result = match deadline {
                Some(deadline) => tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        info!("Configured record duration reached");
                        return Ok(());
                    }
                    result = session.next_frame() => result,
                },
                None => session.next_frame().await,
            };

            match result {
                Ok(Some(frame)) => {
                    // A delivered frame proves the reconnect path works;
                    // the retry budget starts over.
                    *attempts = 0;
                    let sequence = frame.sequence;
                    let is_final = frame.end_of_stream;

                    match sink.submit(frame) {
                        SubmitOutcome::Accepted => {}
                        SubmitOutcome::Rejected(frame) => {
                            debug!(sequence, "Queue full, pausing ingestion");
                            tokio::select! {
                                _ = cancel.cancelled() => return Ok(()),
                                result = sink.submit_wait(frame) => result?,
                            }
                        }
                        SubmitOutcome::Closed(_) => {
                            // The writer died mid-recording; report its
                            // actual failure, not the full queue.
                            return Err(sink.writer_error().await);
                        }
                    }
                    *resume = Some(sequence);

                    if is_final {
                        info!(sequence, "Source marked final frame");
                        return Ok(());
                    }
                }
                Ok(None) => {
                    info!(last_sequence = ?resume, "Stream ended cleanly");
                    return Ok(());
                }
                Err(RecorderError::Cancelled) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Classify a session failure: refresh the token for auth errors, back
    /// off and retry for transport errors, bail out for everything else or
    /// once the retry budget is spent.
    async fn recover(
        &mut self,
        error: RecorderError,
        token: &mut Token,
        attempts: &mut u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if error.needs_token_refresh() {
            warn!(error = %error, "Token rejected mid-session, refreshing");
            let refreshed = self.credentials.refresh(token).await.map_err(|refresh_err| {
                error!(error = %refresh_err, "Token refresh failed, giving up");
                refresh_err
            })?;
            *token = refreshed;
        } else if !error.is_retryable() {
            return Err(error);
        }

        *attempts += 1;
        if *attempts > self.config.retry.max_retries {
            warn!(attempts = *attempts, "Reconnect budget exhausted");
            return Err(error);
        }

        self.set_state(SupervisorState::Reconnecting);
        let backoff = self.config.retry.backoff_for(*attempts - 1);
        debug!(attempt = *attempts, ?backoff, error = %error, "Reconnecting after backoff");
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(backoff) => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("camera_id", &self.camera.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
