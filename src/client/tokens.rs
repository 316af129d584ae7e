//! HTTP client for the CRS token service.
//!
//! Three operations, each a single request/response exchange against a
//! configured base URL: key issuance, key validation, and the authorized
//! call to the protected endpoint. Credential storage is the caller's
//! responsibility; this type only talks to the wire.
//!
//! Every outbound call runs inside a tracing span carrying a fresh request
//! id, and logs status and timing on completion.

use std::time::{Duration, Instant};

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::session::{AccessToken, EncryptedKey};
use crate::config::get_config;
use crate::errors::{AuthError, AuthResult};
use crate::hardware::DeviceId;

const GENERATE_PATH: &str = "/api/token/generate";
const VALIDATE_PATH: &str = "/api/token/validate";
const SECURE_PATH: &str = "/api/crs/secure";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenRequest<'a> {
    mac_address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenResponse {
    encrypted_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateTokenRequest<'a> {
    encrypted_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateTokenResponse {
    access_token: String,
}

/// Client for the token-issuing service.
///
/// Holds a pooled connection; individual calls share nothing else.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: Client,
    base_url: String,
    issue_floor: Duration,
}

impl TokenClient {
    /// Build a client for `base_url` with the default request timeout (30 s)
    /// and issuance pacing floor (3000 ms).
    pub fn new(base_url: impl Into<String>) -> AuthResult<Self> {
        Self::with_options(
            base_url,
            Duration::from_secs(30),
            Duration::from_millis(3000),
            false,
        )
    }

    /// Build a client from the global configuration.
    pub fn from_config() -> AuthResult<Self> {
        let config = get_config()?;
        Self::with_options(
            config.api.base_url.clone(),
            Duration::from_secs(config.api.request_timeout_secs),
            Duration::from_millis(config.api.issue_floor_ms),
            config.api.accept_invalid_certs,
        )
    }

    /// Build a client with explicit timeout, pacing floor, and TLS settings.
    pub fn with_options(
        base_url: impl Into<String>,
        request_timeout: Duration,
        issue_floor: Duration,
        accept_invalid_certs: bool,
    ) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            issue_floor,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange a device identifier for an encrypted key.
    ///
    /// The operation never returns before the pacing floor has elapsed,
    /// measured from call start: when the exchange finishes early the
    /// remainder is slept out, and when the exchange itself takes longer no
    /// extra delay is added. The floor is a UX cadence, not a retry or
    /// backoff.
    pub async fn issue_key(&self, device_id: &DeviceId) -> AuthResult<EncryptedKey> {
        let started = Instant::now();
        let outcome = self.post_generate(device_id).await;

        if let Some(remaining) = self.issue_floor.checked_sub(started.elapsed()) {
            tokio::time::sleep(remaining).await;
        }

        outcome
    }

    async fn post_generate(&self, device_id: &DeviceId) -> AuthResult<EncryptedKey> {
        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        let span = info_span!("issue_key", request_id = %Uuid::new_v4(), url = %url);

        async {
            let started = Instant::now();
            let response = self
                .http
                .post(&url)
                .json(&GenerateTokenRequest {
                    mac_address: device_id.as_str(),
                })
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            info!(
                status = %status.as_u16(),
                duration_ms = %started.elapsed().as_millis(),
                "issuance response received"
            );

            if !status.is_success() {
                return Err(AuthError::Issuance {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: GenerateTokenResponse = serde_json::from_str(&body)
                .map_err(|e| AuthError::MalformedResponse(format!("issuance response: {e}")))?;
            if parsed.encrypted_token.is_empty() {
                return Err(AuthError::MalformedResponse(
                    "issuance response: empty encryptedToken".to_string(),
                ));
            }

            Ok(EncryptedKey::new(parsed.encrypted_token))
        }
        .instrument(span)
        .await
    }

    /// Exchange an encrypted key for an access token.
    pub async fn validate_key(&self, key: &EncryptedKey) -> AuthResult<AccessToken> {
        let url = format!("{}{}", self.base_url, VALIDATE_PATH);
        let span = info_span!("validate_key", request_id = %Uuid::new_v4(), url = %url);

        async {
            let started = Instant::now();
            let response = self
                .http
                .post(&url)
                .json(&ValidateTokenRequest {
                    encrypted_token: key.as_str(),
                })
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            info!(
                status = %status.as_u16(),
                duration_ms = %started.elapsed().as_millis(),
                "validation response received"
            );

            if !status.is_success() {
                return Err(AuthError::Validation {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: ValidateTokenResponse = serde_json::from_str(&body)
                .map_err(|e| AuthError::MalformedResponse(format!("validation response: {e}")))?;
            if parsed.access_token.is_empty() {
                return Err(AuthError::MalformedResponse(
                    "validation response: empty accessToken".to_string(),
                ));
            }

            Ok(AccessToken::new(parsed.access_token))
        }
        .instrument(span)
        .await
    }

    /// Call the protected endpoint with a bearer token.
    ///
    /// Returns the raw response body. A 401/403 is surfaced as
    /// [`AuthError::Unauthorized`], the signal that the token has expired or
    /// been revoked and the caller must re-validate.
    pub async fn call_secure(&self, token: &AccessToken) -> AuthResult<String> {
        let url = format!("{}{}", self.base_url, SECURE_PATH);
        let span = info_span!("call_secure", request_id = %Uuid::new_v4(), url = %url);

        async {
            let started = Instant::now();
            let response = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, format!("Bearer {}", token.as_str()))
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            info!(
                status = %status.as_u16(),
                duration_ms = %started.elapsed().as_millis(),
                "secure response received"
            );

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!(status = %status.as_u16(), "access token rejected");
                return Err(AuthError::Unauthorized {
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(AuthError::Request {
                    status: Some(status.as_u16()),
                    body,
                });
            }

            Ok(body)
        }
        .instrument(span)
        .await
    }
}
