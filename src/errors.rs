//! Error types for the CRS auth client.
//!
//! Every failure surfaced by the crate is an [`AuthError`] kind, so callers
//! can branch on the condition instead of parsing messages. The state machine
//! additionally carries the rendered message into its `Failed` phase.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure taxonomy for identity resolution, the token handshake, and
/// protected-resource calls.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No network interface with a usable hardware address was found.
    #[error("no usable network interface with a hardware address")]
    NoInterface,

    /// Two surviving interface candidates tied under the selection rule.
    #[error("interface selection is ambiguous: multiple candidates named '{0}'")]
    AmbiguousInterface(String),

    /// The platform probe itself failed (command spawn, sysfs read).
    #[error("hardware identity probe failed: {0}")]
    Identity(String),

    /// The issuance endpoint answered with a non-success status.
    #[error("key issuance failed with HTTP {status}: {body}")]
    Issuance { status: u16, body: String },

    /// The validation endpoint answered with a non-success status.
    #[error("key validation failed with HTTP {status}: {body}")]
    Validation { status: u16, body: String },

    /// A success response did not match the expected JSON shape.
    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    /// The protected endpoint rejected the access token (401/403). Not fatal:
    /// the state machine drops back to `KeyIssued` so the caller can
    /// re-validate without re-enrolling.
    #[error("access token rejected with HTTP {status}")]
    Unauthorized { status: u16 },

    /// Generic request failure: transport errors, timeouts, and non-success
    /// statuses outside the authorization class.
    #[error("request failed: {body}")]
    Request { status: Option<u16>, body: String },

    /// An operation was invoked in the wrong phase. Stored credentials and
    /// the current phase are left untouched.
    #[error("operation requires phase '{required}', current phase is '{actual}'")]
    Phase {
        required: &'static str,
        actual: String,
    },

    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        let body = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        AuthError::Request {
            status: err.status().map(|s| s.as_u16()),
            body,
        }
    }
}
