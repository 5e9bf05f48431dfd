//! Error types for recording sessions.
//!
//! All failures surface as [`RecorderError`] variants so that the supervisor
//! can make retry decisions from the error kind alone. The taxonomy follows
//! the recovery contract:
//!
//! - **Auth**: token invalid or expired — recoverable with a refreshed token,
//!   never by blind retry
//! - **Connect / Timeout**: transport setup failed — retryable with backoff
//! - **Disconnected**: mid-stream transport loss — retryable with backoff
//! - **FrameIntegrity**: sequence or decode violation — fails the stream
//!   closed, never skipped
//! - **Io**: disk write failed — fatal to the session
//! - **Cancelled**: cooperative shutdown in progress
//!
//! Backpressure is intentionally *not* an error; it is a flow-control
//! signal carried by [`SubmitOutcome`](crate::sink::SubmitOutcome).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for recorder operations.
pub type Result<T, E = RecorderError> = std::result::Result<T, E>;

/// Main error type for recorder operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RecorderError {
    #[error("Authentication failed: {reason}")]
    Auth {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to connect to stream service: {reason}")]
    Connect {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Stream disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("Frame integrity violation: {details}")]
    FrameIntegrity { details: String },

    #[error("I/O error on {path}: {context}")]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Camera directory request failed: {reason}")]
    Directory { reason: String, status: Option<u16> },

    #[error("Invalid configuration field '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Session failed (last durable sequence: {last_durable:?})")]
    SessionFailed {
        last_durable: Option<u64>,
        #[source]
        source: Box<RecorderError>,
    },
}

impl RecorderError {
    /// Returns whether this error is recoverable by reconnecting with backoff.
    ///
    /// Auth errors are deliberately *not* retryable: retrying with the same
    /// token cannot succeed. The supervisor handles them with a token
    /// refresh instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            RecorderError::Connect { .. } => true,
            RecorderError::Disconnected { .. } => true,
            RecorderError::Timeout { .. } => true,
            RecorderError::Auth { .. } => false,
            RecorderError::FrameIntegrity { .. } => false,
            RecorderError::Io { .. } => false,
            RecorderError::Directory { .. } => false,
            RecorderError::Config { .. } => false,
            RecorderError::Cancelled => false,
            RecorderError::SessionFailed { .. } => false,
        }
    }

    /// Returns whether this error indicates the bearer token must be
    /// refreshed before the next attempt.
    pub fn needs_token_refresh(&self) -> bool {
        matches!(self, RecorderError::Auth { .. })
    }

    /// Helper constructor for authentication errors.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        RecorderError::Auth { reason: reason.into(), source: None }
    }

    /// Helper constructor for authentication errors with a source.
    pub fn auth_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RecorderError::Auth { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for connection errors.
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        RecorderError::Connect { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with a source.
    pub fn connect_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RecorderError::Connect { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for mid-stream disconnects.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        RecorderError::Disconnected { reason: reason.into() }
    }

    /// Helper constructor for frame integrity violations.
    pub fn frame_integrity(details: impl Into<String>) -> Self {
        RecorderError::FrameIntegrity { details: details.into() }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(context: impl Into<String>, path: PathBuf, source: std::io::Error) -> Self {
        RecorderError::Io { context: context.into(), path, source }
    }

    /// Helper constructor for directory errors.
    pub fn directory_failed(reason: impl Into<String>, status: Option<u16>) -> Self {
        RecorderError::Directory { reason: reason.into(), status }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RecorderError::Config { field: field.into(), reason: reason.into() }
    }

    /// Wrap an error as the terminal session failure, attaching the last
    /// durably written sequence number so callers know exactly how much of
    /// the recording survived.
    pub fn session_failed(last_durable: Option<u64>, source: RecorderError) -> Self {
        RecorderError::SessionFailed { last_durable, source: Box::new(source) }
    }
}
