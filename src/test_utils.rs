//! Test doubles shared by unit and scenario tests.
//!
//! Scripted transports and credential providers let the session and
//! supervisor tests drive exact failure sequences (disconnects, token
//! expiry, ordering violations) without a live camera service.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::auth::CredentialProvider;
use crate::error::{RecorderError, Result};
use crate::transport::{FrameSource, Transport};
use crate::types::{CameraDescriptor, Frame, Token};

/// Build a deterministic frame for sequence `seq`.
pub fn frame(seq: u64) -> Frame {
    Frame::new(seq, 1_000_000 + seq, Bytes::from(format!("payload-{seq}")))
}

/// A camera descriptor for scripted sessions.
pub fn camera() -> CameraDescriptor {
    CameraDescriptor { id: "cam-1".to_string(), name: "scripted".to_string(), resolution: None }
}

/// One scripted event a [`ScriptedSource`] will replay.
#[derive(Debug)]
pub enum ScriptItem {
    /// Deliver this frame.
    Frame(Frame),
    /// Clean end-of-stream.
    End,
    /// Abrupt transport loss.
    Disconnect,
    /// Remote reports token expiry.
    AuthExpired,
    /// Suspend forever; only cancellation can unblock the caller.
    Pending,
}

/// Frame source replaying a fixed script.
#[derive(Debug)]
pub struct ScriptedSource {
    items: VecDeque<ScriptItem>,
}

impl ScriptedSource {
    pub fn new(items: Vec<ScriptItem>) -> Self {
        Self { items: items.into() }
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.items.pop_front() {
            None | Some(ScriptItem::End) => Ok(None),
            Some(ScriptItem::Frame(frame)) => Ok(Some(frame)),
            Some(ScriptItem::Disconnect) => Err(RecorderError::disconnected("scripted disconnect")),
            Some(ScriptItem::AuthExpired) => {
                Err(RecorderError::auth_failed("scripted token expiry"))
            }
            Some(ScriptItem::Pending) => futures::future::pending().await,
        }
    }
}

/// Transport handing out scripted sources, one per connect.
///
/// Optionally fails the first `fail_connects` connection attempts with a
/// retryable connect error, for backoff and retry-exhaustion tests.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<ScriptItem>>>,
    connect_failures: AtomicUsize,
    connects: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Transport serving exactly one connection.
    pub fn single(script: Vec<ScriptItem>) -> Self {
        Self::with_scripts(vec![script])
    }

    /// Transport serving one connection per script, in order.
    pub fn with_scripts(scripts: Vec<Vec<ScriptItem>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connect_failures: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` connection attempts before serving scripts.
    pub fn failing_first(mut self, n: usize) -> Self {
        *self.connect_failures.get_mut() = n;
        self
    }

    /// Number of connection attempts made (including failed ones).
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Access tokens presented across all connection attempts, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _camera_id: &str, token: &Token) -> Result<Box<dyn FrameSource>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.access_token().to_string());

        let failures = self.connect_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.connect_failures.store(failures - 1, Ordering::SeqCst);
            return Err(RecorderError::connect_failed("scripted connect failure"));
        }

        match self.scripts.lock().unwrap().pop_front() {
            Some(script) => Ok(Box::new(ScriptedSource::new(script))),
            None => Err(RecorderError::connect_failed("no scripted connection left")),
        }
    }
}

// Arc delegation so tests can keep a handle for assertions after the
// supervisor takes ownership of the boxed trait object.
#[async_trait::async_trait]
impl Transport for Arc<ScriptedTransport> {
    async fn connect(&self, camera_id: &str, token: &Token) -> Result<Box<dyn FrameSource>> {
        self.as_ref().connect(camera_id, token).await
    }
}

/// Credential provider minting predictable tokens.
pub struct StaticCredentials {
    token_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    fail_refresh: bool,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self { token_calls: AtomicUsize::new(0), refresh_calls: AtomicUsize::new(0), fail_refresh: false }
    }

    /// Make every refresh attempt fail with an auth error.
    pub fn failing_refresh() -> Self {
        Self { fail_refresh: true, ..Self::new() }
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn mint(&self, label: &str, n: usize) -> Token {
        Token::new(format!("{label}-{n}"), SystemTime::now() + Duration::from_secs(3600))
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> Result<Token> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.mint("token", n))
    }

    async fn refresh(&self, _previous: &Token) -> Result<Token> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(RecorderError::auth_failed("scripted refresh failure"));
        }
        Ok(self.mint("refreshed", n))
    }
}

#[async_trait::async_trait]
impl CredentialProvider for Arc<StaticCredentials> {
    async fn token(&self) -> Result<Token> {
        self.as_ref().token().await
    }

    async fn refresh(&self, previous: &Token) -> Result<Token> {
        self.as_ref().refresh(previous).await
    }
}
