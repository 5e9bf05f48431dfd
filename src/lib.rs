//! Authenticated camera stream capture to durable append-only recordings.
//!
//! Camscribe connects to a camera streaming service with a bearer token,
//! consumes frames as they arrive and persists them to an append-only
//! recording file without loss or reordering. The hard part lives in three
//! cooperating components:
//!
//! - [`StreamSession`]: one authenticated network stream producing frames
//!   in strict sequence order, with explicit cancellation
//! - [`FrameSink`]: durable persistence behind a bounded queue, so disk
//!   latency never stalls the socket reader
//! - [`Supervisor`]: lifecycle orchestration — token refresh, reconnect
//!   with bounded backoff, backpressure and shutdown coordination
//!
//! # Quick start
//!
//! ```rust,no_run
//! use camscribe::{Recorder, RecorderConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> camscribe::Result<()> {
//!     let config = RecorderConfig::from_yaml_file("camscribe.yaml")?;
//!     let recorder = Recorder::from_config(config)?;
//!
//!     let cameras = recorder.list_cameras().await?;
//!     let camera = cameras.into_iter().next().expect("no cameras available");
//!
//!     let cancel = CancellationToken::new();
//!     let summary = recorder.record(camera, cancel).await?;
//!     println!("recorded {} frames", summary.frames_written);
//!     Ok(())
//! }
//! ```
//!
//! Interactive camera selection, secret prompting and process setup belong
//! to the embedding application; this crate exposes the trait seams
//! ([`CredentialProvider`], [`DirectoryClient`], [`Transport`]) so they can
//! be replaced in tests or adapted to other services.

// Core types and error handling
mod error;
pub mod types;

// Configuration and external collaborators
pub mod auth;
pub mod config;
pub mod directory;

// Streaming pipeline
pub mod session;
pub mod sink;
pub mod supervisor;
pub mod transport;

// Record format
pub mod record;
pub mod wire;

#[cfg(test)]
pub mod test_utils;

// Core exports
pub use error::{RecorderError, Result};
pub use types::{
    CameraDescriptor, FailureKind, Frame, RecordingSummary, Resolution, SessionState,
    SupervisorState, Token,
};

pub use auth::{CredentialProvider, KeycloakCredentials};
pub use config::{AuthConfig, RecorderConfig, RetryPolicy};
pub use directory::{DirectoryClient, HttpDirectoryClient};
pub use record::{Record, RecordReader};
pub use session::StreamSession;
pub use sink::{FrameSink, SinkReport, SubmitOutcome};
pub use supervisor::Supervisor;
pub use transport::{FrameSource, TcpTransport, Transport};

use tokio_util::sync::CancellationToken;

/// High-level entry point wiring the production collaborators together.
///
/// [`Recorder`] builds the Keycloak credential provider, the HTTP camera
/// directory client and the TCP stream transport from one validated
/// [`RecorderConfig`], then hands them to a [`Supervisor`] for the actual
/// recording run.
pub struct Recorder {
    config: RecorderConfig,
    credentials: Box<dyn CredentialProvider>,
    directory: Box<dyn DirectoryClient>,
}

impl Recorder {
    /// Build a recorder from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error when validation fails or when no client
    /// secret can be resolved.
    pub fn from_config(config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        let credentials =
            KeycloakCredentials::from_config(&config.auth, config.request_timeout())?;
        let directory =
            HttpDirectoryClient::new(&config.directory_url, config.request_timeout())?;
        Ok(Self {
            config,
            credentials: Box::new(credentials),
            directory: Box::new(directory),
        })
    }

    /// Fetch the recordable cameras visible to this client.
    pub async fn list_cameras(&self) -> Result<Vec<CameraDescriptor>> {
        let token = self.credentials.token().await?;
        self.directory.list_cameras(&token).await
    }

    /// Record `camera` until the stream ends, the configured duration
    /// elapses, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Terminal failures are reported as [`RecorderError::SessionFailed`]
    /// with the last durably written sequence number.
    pub async fn record(
        self,
        camera: CameraDescriptor,
        cancel: CancellationToken,
    ) -> Result<RecordingSummary> {
        let transport =
            TcpTransport::new(self.config.stream_endpoint.clone(), self.config.connect_timeout());
        let supervisor =
            Supervisor::new(self.config, self.credentials, Box::new(transport), camera)?;
        supervisor.run(cancel).await
    }
}
