//! CRS auth client - device-bound enrollment and access-token handshake.
//!
//! The crate drives a three-step trust-establishment protocol against a
//! token-issuing service:
//!
//! 1. resolve a stable device identifier from local hardware,
//! 2. exchange it for an opaque encrypted key (`/api/token/generate`),
//! 3. exchange the key for a bearer access token (`/api/token/validate`),
//!
//! after which protected calls go to `/api/crs/secure` with the token. The
//! sequence is orchestrated by [`client::machine::AuthSession`], which owns
//! the credentials and exposes each phase change to the driving surface.
//!
//! # Example
//!
//! ```rust,ignore
//! use crs_auth::client::machine::AuthSession;
//! use crs_auth::client::tokens::TokenClient;
//!
//! let client = TokenClient::new("https://localhost:7121")?;
//! let mut session = AuthSession::new(client);
//!
//! session.enroll().await?;
//! session.validate().await?;
//! let body = session.fetch_secure().await?;
//! ```

// Core modules (always available)
pub mod config;
pub mod errors;
pub mod hardware;

// Client-related modules
pub mod client {
    pub mod machine;
    pub mod session;
    pub mod tokens;
}
