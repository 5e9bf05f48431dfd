//! Credential acquisition against the identity provider.
//!
//! The supervisor only sees the [`CredentialProvider`] trait; production
//! code wires in [`KeycloakCredentials`], tests substitute scripted
//! providers. Tokens are minted with the OAuth client-credentials grant and
//! carry their expiry so callers can refresh before presenting a stale
//! token.

use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{RecorderError, Result};
use crate::types::Token;

/// Supplies bearer tokens on demand and refreshes them before expiry.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Acquire a fresh token.
    async fn token(&self) -> Result<Token>;

    /// Replace an expired or rejected token.
    ///
    /// The previous token is passed so providers holding refresh tokens can
    /// use them; the client-credentials flow simply mints a new one.
    async fn refresh(&self, previous: &Token) -> Result<Token>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Keycloak client-credentials token source.
pub struct KeycloakCredentials {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    request_timeout: Duration,
}

impl KeycloakCredentials {
    /// Build from the auth section of the recorder configuration.
    pub fn from_config(auth: &AuthConfig, request_timeout: Duration) -> Result<Self> {
        let client_secret = auth.resolve_client_secret()?;
        let token_url = auth
            .server_url
            .join(&format!("realms/{}/protocol/openid-connect/token", auth.realm))
            .map_err(|e| RecorderError::config_invalid("auth.server_url", e.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            token_url,
            client_id: auth.client_id.clone(),
            client_secret,
            request_timeout,
        })
    }

    async fn request_token(&self) -> Result<Token> {
        debug!(url = %self.token_url, client_id = %self.client_id, "Requesting bearer token");

        let response = self
            .http
            .post(self.token_url.clone())
            .timeout(self.request_timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecorderError::Timeout { duration: self.request_timeout }
                } else {
                    RecorderError::connect_failed_with_source(
                        "token endpoint unreachable",
                        Box::new(e),
                    )
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(RecorderError::auth_failed(format!(
                "token endpoint rejected credentials (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(RecorderError::connect_failed(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            RecorderError::auth_failed_with_source("malformed token response", Box::new(e))
        })?;

        let expires_at = SystemTime::now() + Duration::from_secs(body.expires_in);
        info!(expires_in = body.expires_in, "Acquired bearer token");

        Ok(Token::new(body.access_token, expires_at))
    }
}

// Manual impl: the client secret must never reach debug output.
impl std::fmt::Debug for KeycloakCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for KeycloakCredentials {
    async fn token(&self) -> Result<Token> {
        self.request_token().await
    }

    async fn refresh(&self, _previous: &Token) -> Result<Token> {
        // Client-credentials clients hold no refresh token; a refresh is a
        // fresh grant.
        self.request_token().await
    }
}
