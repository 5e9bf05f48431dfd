//! Camera directory client.
//!
//! Resolves the set of recordable cameras from the directory service. The
//! supervisor and any selection UI consume [`DirectoryClient`]; production
//! code uses [`HttpDirectoryClient`] against the camera service REST API.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{RecorderError, Result};
use crate::types::{CameraDescriptor, Token};

/// Lists recordable camera resources.
#[async_trait::async_trait]
pub trait DirectoryClient: Send + Sync + 'static {
    /// Fetch all cameras visible to the given token.
    async fn list_cameras(&self, token: &Token) -> Result<Vec<CameraDescriptor>>;
}

#[derive(Debug, Deserialize)]
struct CamerasResponse {
    cameras: Vec<CameraDescriptor>,
}

/// Directory client against the camera service REST endpoint.
pub struct HttpDirectoryClient {
    http: reqwest::Client,
    cameras_url: Url,
    request_timeout: Duration,
}

impl HttpDirectoryClient {
    pub fn new(directory_url: &Url, request_timeout: Duration) -> Result<Self> {
        let cameras_url = directory_url
            .join("v1/cameras")
            .map_err(|e| RecorderError::config_invalid("directory_url", e.to_string()))?;
        Ok(Self { http: reqwest::Client::new(), cameras_url, request_timeout })
    }
}

#[async_trait::async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn list_cameras(&self, token: &Token) -> Result<Vec<CameraDescriptor>> {
        debug!(url = %self.cameras_url, "Fetching camera list");

        let response = self
            .http
            .get(self.cameras_url.clone())
            .timeout(self.request_timeout)
            .bearer_auth(token.access_token())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecorderError::Timeout { duration: self.request_timeout }
                } else {
                    RecorderError::directory_failed(
                        format!("camera service unreachable: {e}"),
                        None,
                    )
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RecorderError::auth_failed(format!(
                "camera service rejected token (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(RecorderError::directory_failed(
                "camera service returned error",
                Some(status.as_u16()),
            ));
        }

        let body: CamerasResponse = response.json().await.map_err(|e| {
            RecorderError::directory_failed(format!("malformed camera list: {e}"), None)
        })?;

        debug!(count = body.cameras.len(), "Camera list fetched");
        Ok(body.cameras)
    }
}
