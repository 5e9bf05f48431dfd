//! Lifecycle state machines for the stream session and the supervisor.

/// Why a stream session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote rejected the token mid-stream; refresh and reconnect.
    AuthExpired,
    /// Transport-level loss; reconnect with backoff.
    Disconnected,
    /// Sequence or decode violation; the stream fails closed.
    FrameIntegrity,
}

/// State of one stream session.
///
/// Exactly one [`StreamSession`](crate::session::StreamSession) writes this
/// state; the supervisor only reads it through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    /// The source signalled end-of-stream; already-received frames may still
    /// be draining into the sink.
    Draining,
    Closed,
    Failed(FailureKind),
}

impl SessionState {
    /// Whether the session has reached a state it can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }
}

/// State of the supervisor's recovery state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    #[default]
    Starting,
    Running,
    Reconnecting,
    Stopping,
    Stopped,
    FailedTerminal,
}
