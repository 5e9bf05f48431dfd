//! Frame sink: durable persistence decoupled from network receipt.
//!
//! The sink owns the output file and a dedicated writer task fed by a
//! bounded queue. The producer side never blocks on disk latency up to the
//! queue's capacity; beyond it [`FrameSink::submit`] reports backpressure
//! and the caller slows ingestion instead of dropping frames.
//!
//! Durability contract: once `submit` returns `Accepted`, the frame is
//! written and flushed before [`FrameSink::finish`] returns successfully,
//! or `finish` reports the failure. The last-durable watermark only
//! advances after a completed write + flush, so a crash can never leave
//! the watermark ahead of the file.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::types::Frame;
use crate::wire::{RecordHeader, RECORD_HEADER_LEN};

/// Outcome of a non-blocking submit.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The frame is queued and will be durably written.
    Accepted,
    /// The queue is full; the frame is handed back untouched. Flow-control
    /// signal, not an error.
    Rejected(Frame),
    /// The writer stopped (finished, or failed on I/O); the frame is handed
    /// back. Call [`FrameSink::finish`] for the writer's actual failure.
    Closed(Frame),
}

/// What the writer accomplished by the time the sink finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkReport {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub last_sequence: Option<u64>,
}

/// Durable, ordered frame persistence with a bounded queue.
#[derive(Debug)]
pub struct FrameSink {
    tx: Option<mpsc::Sender<Frame>>,
    writer: Option<JoinHandle<Result<SinkReport>>>,
    durable_rx: watch::Receiver<Option<u64>>,
    destination: PathBuf,
    finished: Option<std::result::Result<SinkReport, String>>,
}

impl FrameSink {
    /// Open `destination` append-only and start the writer task.
    pub async fn start(destination: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&destination)
            .await
            .map_err(|e| {
                RecorderError::io_error("open recording destination", destination.clone(), e)
            })?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (durable_tx, durable_rx) = watch::channel(None);

        let path = destination.clone();
        let writer =
            tokio::spawn(async move { Self::writer_task(file, path, rx, durable_tx).await });

        info!(destination = %destination.display(), capacity, "Frame sink started");
        Ok(Self { tx: Some(tx), writer: Some(writer), durable_rx, destination, finished: None })
    }

    /// Writer task: strict FIFO drain of the queue onto disk.
    ///
    /// Each frame is flushed before the durable watermark advances. The
    /// task ends when the queue closes (all senders dropped) or on the
    /// first write failure.
    async fn writer_task(
        file: File,
        path: PathBuf,
        mut rx: mpsc::Receiver<Frame>,
        durable_tx: watch::Sender<Option<u64>>,
    ) -> Result<SinkReport> {
        let mut writer = BufWriter::new(file);
        let mut report = SinkReport::default();

        while let Some(frame) = rx.recv().await {
            let header = RecordHeader::for_frame(&frame);
            writer
                .write_all(&header.encode())
                .await
                .map_err(|e| RecorderError::io_error("append record header", path.clone(), e))?;
            writer
                .write_all(&frame.payload)
                .await
                .map_err(|e| RecorderError::io_error("append record payload", path.clone(), e))?;
            writer
                .flush()
                .await
                .map_err(|e| RecorderError::io_error("flush record", path.clone(), e))?;

            report.frames_written += 1;
            report.bytes_written += (RECORD_HEADER_LEN + frame.payload.len()) as u64;
            report.last_sequence = Some(frame.sequence);
            let _ = durable_tx.send(Some(frame.sequence));
        }

        let file = writer.into_inner();
        file.sync_all()
            .await
            .map_err(|e| RecorderError::io_error("sync recording", path.clone(), e))?;

        debug!(
            frames = report.frames_written,
            bytes = report.bytes_written,
            "Writer task drained and synced"
        );
        Ok(report)
    }

    /// Non-blocking enqueue. Returns the frame on backpressure so the
    /// caller can decide how to slow ingestion.
    pub fn submit(&mut self, frame: Frame) -> SubmitOutcome {
        let Some(tx) = self.tx.as_ref() else {
            warn!("submit after finish, frame rejected");
            return SubmitOutcome::Closed(frame);
        };
        match tx.try_send(frame) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(frame)) => SubmitOutcome::Rejected(frame),
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                warn!("frame writer no longer accepting frames");
                SubmitOutcome::Closed(frame)
            }
        }
    }

    /// Enqueue, waiting for queue capacity.
    ///
    /// This is the backpressure path: it slows ingestion to the writer's
    /// pace without dropping the frame. A writer that stopped early
    /// surfaces its own failure here, not a generic one.
    pub async fn submit_wait(&mut self, frame: Frame) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(self.writer_error().await);
        };
        let tx = tx.clone();
        if tx.send(frame).await.is_err() {
            return Err(self.writer_error().await);
        }
        Ok(())
    }

    /// Join a writer that stopped accepting frames and return its actual
    /// failure. Falls back to a generic error if the writer somehow ended
    /// cleanly.
    pub(crate) async fn writer_error(&mut self) -> RecorderError {
        match self.finish().await {
            Err(e) => e,
            Ok(_) => self.writer_stopped_error(),
        }
    }

    fn writer_stopped_error(&self) -> RecorderError {
        RecorderError::io_error(
            "frame writer stopped before accepting frame",
            self.destination.clone(),
            std::io::Error::other("writer task ended"),
        )
    }

    /// Sequence number of the last durably written frame.
    pub fn last_durable(&self) -> Option<u64> {
        *self.durable_rx.borrow()
    }

    /// Watch channel following the durable watermark.
    pub fn durable_updates(&self) -> watch::Receiver<Option<u64>> {
        self.durable_rx.clone()
    }

    /// Signal that no more frames will be submitted, drain the queue fully,
    /// flush, sync and close the file.
    ///
    /// Idempotent: a second call returns the same outcome without touching
    /// the file again.
    pub async fn finish(&mut self) -> Result<SinkReport> {
        if let Some(done) = &self.finished {
            return match done {
                Ok(report) => Ok(*report),
                Err(msg) => Err(RecorderError::io_error(
                    msg.clone(),
                    self.destination.clone(),
                    std::io::Error::other("sink already failed"),
                )),
            };
        }

        // Dropping the sender closes the queue; the writer drains what was
        // accepted and then syncs.
        self.tx = None;
        let Some(writer) = self.writer.take() else {
            return Err(self.writer_stopped_error());
        };

        let result = match writer.await {
            Ok(result) => result,
            Err(join_err) => Err(RecorderError::io_error(
                "writer task panicked",
                self.destination.clone(),
                std::io::Error::other(join_err.to_string()),
            )),
        };

        match &result {
            Ok(report) => {
                info!(
                    frames = report.frames_written,
                    bytes = report.bytes_written,
                    last_sequence = ?report.last_sequence,
                    "Recording finished"
                );
                self.finished = Some(Ok(*report));
            }
            Err(e) => {
                warn!(error = %e, "Recording finished with failure");
                self.finished = Some(Err(e.to_string()));
            }
        }
        result
    }
}
