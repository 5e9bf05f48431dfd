//! Shared data model for recording sessions.

mod frame;
mod state;

pub use frame::Frame;
pub use state::{FailureKind, SessionState, SupervisorState};

use std::time::{Duration, SystemTime};

use serde::Deserialize;

/// Bearer token with its expiry timestamp.
///
/// The token string is opaque; only the credential provider knows how it was
/// minted. Holders must check [`Token::is_expired`] before each use and ask
/// the provider for a fresh token when it no longer holds.
#[derive(Debug, Clone)]
pub struct Token {
    access_token: String,
    expires_at: SystemTime,
}

impl Token {
    /// Safety margin applied to expiry checks so that a token is never
    /// presented to the remote within the last moments of its lifetime.
    pub const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

    pub fn new(access_token: impl Into<String>, expires_at: SystemTime) -> Self {
        Self { access_token: access_token.into(), expires_at }
    }

    /// The opaque credential string, used as `Authorization: Bearer` value.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether the token is expired (with the safety margin applied).
    pub fn is_expired(&self) -> bool {
        self.expires_within(Self::EXPIRY_MARGIN)
    }

    /// Whether the token expires within the given duration from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at.duration_since(SystemTime::now()) {
            Ok(remaining) => remaining <= margin,
            Err(_) => true,
        }
    }
}

/// Capture resolution advertised by a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// One recordable camera as returned by the directory service.
///
/// Immutable once fetched; the supervisor keeps a copy of the selected
/// camera for the lifetime of the recording session.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraDescriptor {
    /// Stable identifier within the camera service.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Advertised capture resolution, when the service reports one.
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

/// Statistics reported after a recording run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingSummary {
    /// Number of frames durably written.
    pub frames_written: u64,
    /// Total payload and header bytes written.
    pub bytes_written: u64,
    /// Sequence number of the last durable frame, if any frame was written.
    pub last_sequence: Option<u64>,
}
