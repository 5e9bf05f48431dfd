//! Recorder configuration.
//!
//! The configuration is an explicit, validated structure consumed once at
//! supervisor construction. It can be deserialized from a YAML file or
//! assembled programmatically; either way [`RecorderConfig::validate`] runs
//! before the supervisor accepts it.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{RecorderError, Result};

fn default_queue_capacity() -> usize {
    256
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

/// Reconnect policy applied by the supervisor.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum consecutive reconnect attempts before the session fails
    /// terminally. The counter resets once a reconnected stream delivers a
    /// frame.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5, initial_backoff_ms: 50, max_backoff_ms: 5_000 }
    }
}

impl RetryPolicy {
    /// Backoff delay for the given zero-based attempt number.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Identity-provider settings for the client-credentials token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the identity provider, e.g. `https://auth.example.com/`.
    pub server_url: Url,
    /// Realm the client is registered under.
    pub realm: String,
    /// OAuth client id.
    pub client_id: String,
    /// Client secret, inline. Prefer `client_secret_env` for anything
    /// outside local development.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Name of an environment variable holding the client secret.
    #[serde(default)]
    pub client_secret_env: Option<String>,
}

impl AuthConfig {
    /// Resolve the client secret from the inline field or the named
    /// environment variable, in that order.
    pub fn resolve_client_secret(&self) -> Result<String> {
        if let Some(secret) = &self.client_secret {
            if !secret.is_empty() {
                return Ok(secret.clone());
            }
        }
        if let Some(var) = &self.client_secret_env {
            if let Ok(secret) = env::var(var) {
                if !secret.is_empty() {
                    return Ok(secret);
                }
            }
            return Err(RecorderError::config_invalid(
                "auth.client_secret_env",
                format!("environment variable '{var}' is unset or empty"),
            ));
        }
        Err(RecorderError::config_invalid(
            "auth.client_secret",
            "no client secret configured (set client_secret or client_secret_env)",
        ))
    }
}

/// Top-level recorder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// `host:port` of the camera stream service.
    pub stream_endpoint: String,
    /// Base URL of the camera directory service.
    pub directory_url: Url,
    /// Identity provider settings.
    pub auth: AuthConfig,
    /// Destination path for the recording file.
    pub destination: PathBuf,
    /// Capacity of the bounded frame queue between network receipt and the
    /// disk writer. Bounds memory; backpressure applies beyond it.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Reconnect policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Timeout for stream connection establishment.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Timeout for token and directory HTTP requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Stop the recording cleanly after this many seconds, if set.
    #[serde(default)]
    pub record_duration_secs: Option<u64>,
}

impl RecorderConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::io_error("read config file", path.to_path_buf(), e))?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate a configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: RecorderConfig = serde_yaml_ng::from_str(raw)
            .map_err(|e| RecorderError::config_invalid("<yaml>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check all fields the supervisor depends on.
    pub fn validate(&self) -> Result<()> {
        if self.stream_endpoint.trim().is_empty() {
            return Err(RecorderError::config_invalid("stream_endpoint", "must not be empty"));
        }
        if !self.stream_endpoint.contains(':') {
            return Err(RecorderError::config_invalid(
                "stream_endpoint",
                "expected host:port",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RecorderError::config_invalid("queue_capacity", "must be at least 1"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RecorderError::config_invalid("connect_timeout_ms", "must be positive"));
        }
        if self.request_timeout_ms == 0 {
            return Err(RecorderError::config_invalid("request_timeout_ms", "must be positive"));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(RecorderError::config_invalid("destination", "must not be empty"));
        }
        if self.auth.realm.trim().is_empty() {
            return Err(RecorderError::config_invalid("auth.realm", "must not be empty"));
        }
        if self.auth.client_id.trim().is_empty() {
            return Err(RecorderError::config_invalid("auth.client_id", "must not be empty"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn record_duration(&self) -> Option<Duration> {
        self.record_duration_secs.map(Duration::from_secs)
    }
}
