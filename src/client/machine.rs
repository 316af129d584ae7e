//! Enrollment state machine for the CRS handshake.
//!
//! Drives the sequence Idle -> Identifying -> KeyIssued -> TokenValidated,
//! owning the [`SessionStore`] so that credentials are written exactly once
//! per successful transition and cleared whenever the session fails or is
//! restarted. Every phase change is broadcast on a watch channel and logged
//! as a structured event.

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::session::{AccessToken, EncryptedKey, SessionStore};
use crate::client::tokens::TokenClient;
use crate::errors::{AuthError, AuthResult};
use crate::hardware::{resolve_device_id, DeviceId};

/// Position in the enrollment/authorization sequence.
///
/// Exactly one phase holds at any time. Transitions are strictly forward
/// except into `Failed`, which is reachable from any non-terminal phase and
/// is itself terminal until [`AuthSession::restart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    /// No enrollment has been attempted since startup or the last restart.
    Idle,
    /// Resolving the device identity and issuing a key.
    Identifying,
    /// An encrypted key is held; an access token has not been validated yet.
    KeyIssued,
    /// An access token is held and protected calls are possible.
    TokenValidated,
    /// A transition failed; the reason is the rendered error message.
    Failed(String),
}

impl AuthPhase {
    /// Short machine-readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            AuthPhase::Idle => "idle",
            AuthPhase::Identifying => "identifying",
            AuthPhase::KeyIssued => "key-issued",
            AuthPhase::TokenValidated => "token-validated",
            AuthPhase::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AuthPhase::Failed(_))
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPhase::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Single-session orchestrator for the three-step handshake.
///
/// At most one network operation is in flight at a time; each public
/// operation checks the current phase before doing anything, so calls in the
/// wrong order fail with [`AuthError::Phase`] without touching state.
/// Credentials are only written after the corresponding call fully succeeds,
/// so a dropped in-flight operation never stores a partial credential.
///
/// No operation retries automatically; retry policy belongs to the caller
/// via [`AuthSession::restart`].
pub struct AuthSession {
    client: TokenClient,
    store: SessionStore,
    device_id: Option<DeviceId>,
    phase: AuthPhase,
    phase_tx: watch::Sender<AuthPhase>,
}

impl AuthSession {
    pub fn new(client: TokenClient) -> Self {
        let (phase_tx, _) = watch::channel(AuthPhase::Idle);
        Self {
            client,
            store: SessionStore::new(),
            device_id: None,
            phase: AuthPhase::Idle,
            phase_tx,
        }
    }

    /// Build a session from the global configuration.
    pub fn from_config() -> AuthResult<Self> {
        Ok(Self::new(TokenClient::from_config()?))
    }

    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    /// Subscribe to phase changes.
    ///
    /// The receiver always reflects the current phase; a driving surface
    /// (CLI, GUI, service) can await changes to update progress indicators.
    pub fn subscribe(&self) -> watch::Receiver<AuthPhase> {
        self.phase_tx.subscribe()
    }

    /// The device identifier resolved during enrollment, if any.
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    /// The encrypted key held by the session, if any.
    pub fn encrypted_key(&self) -> Option<&EncryptedKey> {
        self.store.key()
    }

    /// The access token held by the session, if any.
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.store.token()
    }

    /// Resolve the device identity and exchange it for an encrypted key:
    /// Idle -> Identifying -> KeyIssued.
    ///
    /// Any failure ends in `Failed` with the store cleared.
    pub async fn enroll(&mut self) -> AuthResult<()> {
        self.require_phase(&AuthPhase::Idle, "idle")?;
        self.transition(AuthPhase::Identifying);

        let device_id = match resolve_device_id() {
            Ok(id) => id,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        self.issue_for(device_id).await
    }

    /// Like [`AuthSession::enroll`], but with a caller-supplied identity.
    ///
    /// For hosts that derive the device identifier through some other
    /// channel than the local interface probe.
    pub async fn enroll_with(&mut self, device_id: DeviceId) -> AuthResult<()> {
        self.require_phase(&AuthPhase::Idle, "idle")?;
        self.transition(AuthPhase::Identifying);
        self.issue_for(device_id).await
    }

    async fn issue_for(&mut self, device_id: DeviceId) -> AuthResult<()> {
        info!(device_id = %device_id, "device identity resolved");

        match self.client.issue_key(&device_id).await {
            Ok(key) => {
                self.device_id = Some(device_id);
                self.store.set_key(key);
                self.transition(AuthPhase::KeyIssued);
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Exchange the held encrypted key for an access token:
    /// KeyIssued -> TokenValidated.
    pub async fn validate(&mut self) -> AuthResult<()> {
        self.require_phase(&AuthPhase::KeyIssued, "key-issued")?;

        let Some(key) = self.store.key().cloned() else {
            // Unreachable while this type is the store's only writer.
            return Err(AuthError::Phase {
                required: "key-issued",
                actual: self.phase.to_string(),
            });
        };

        match self.client.validate_key(&key).await {
            Ok(token) => {
                self.store.set_token(token);
                self.transition(AuthPhase::TokenValidated);
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Call the protected endpoint with the held access token.
    ///
    /// Success is a self-loop in `TokenValidated` and returns the body. A
    /// rejected token clears only the token and re-enters `KeyIssued` so the
    /// caller can re-validate without re-enrolling; any other failure ends in
    /// `Failed` with the store cleared.
    pub async fn fetch_secure(&mut self) -> AuthResult<String> {
        self.require_phase(&AuthPhase::TokenValidated, "token-validated")?;

        let Some(token) = self.store.token().cloned() else {
            return Err(AuthError::Phase {
                required: "token-validated",
                actual: self.phase.to_string(),
            });
        };

        match self.client.call_secure(&token).await {
            Ok(body) => {
                info!(bytes = body.len(), "secure call succeeded");
                Ok(body)
            }
            Err(err @ AuthError::Unauthorized { .. }) => {
                self.store.clear_token();
                self.transition(AuthPhase::KeyIssued);
                Err(err)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Discard all session state and return to Idle. The only exit from
    /// `Failed`.
    pub fn restart(&mut self) {
        self.store.clear();
        self.device_id = None;
        self.transition(AuthPhase::Idle);
    }

    /// Explicit logout: drops both credentials and returns to Idle.
    pub fn logout(&mut self) {
        self.restart();
    }

    fn require_phase(&self, expected: &AuthPhase, required: &'static str) -> AuthResult<()> {
        if self.phase == *expected {
            Ok(())
        } else {
            Err(AuthError::Phase {
                required,
                actual: self.phase.to_string(),
            })
        }
    }

    fn transition(&mut self, next: AuthPhase) {
        info!(from = %self.phase, to = %next, "auth phase transition");
        self.phase = next.clone();
        self.phase_tx.send_replace(next);
    }

    fn fail(&mut self, err: &AuthError) {
        self.store.clear();
        self.device_id = None;
        warn!(error = %err, "session failed");
        self.transition(AuthPhase::Failed(err.to_string()));
    }
}
