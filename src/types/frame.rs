//! Frame type flowing from the network into the sink.

use bytes::Bytes;

/// One captured frame as received from the stream service.
///
/// This is the fundamental data unit that flows through the pipeline.
/// Ownership moves from the stream session into the sink queue; no two
/// components ever hold the same frame mutably.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Monotonically increasing sequence number assigned by the source.
    pub sequence: u64,

    /// Capture timestamp in microseconds since the Unix epoch.
    pub timestamp_micros: u64,

    /// Encoded frame payload (zero-copy via Bytes).
    pub payload: Bytes,

    /// Set when the source marks this frame as the final one of the stream.
    pub end_of_stream: bool,
}

impl Frame {
    /// Create a new frame.
    pub fn new(sequence: u64, timestamp_micros: u64, payload: impl Into<Bytes>) -> Self {
        Self { sequence, timestamp_micros, payload: payload.into(), end_of_stream: false }
    }

    /// Mark this frame as the final one of the stream.
    pub fn with_end_of_stream(mut self) -> Self {
        self.end_of_stream = true;
        self
    }
}
