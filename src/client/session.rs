//! In-memory credential store for a single enrollment session.
//!
//! Credentials live in process memory only and are never persisted. The
//! store is deliberately dumb: it holds at most one encrypted key and one
//! access token, and leaves the single-writer discipline to the state
//! machine that owns it.

use std::fmt;

/// Opaque encrypted key issued in exchange for a device identifier.
///
/// Treated as a capability: never parsed or decrypted client-side.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedKey(String);

impl EncryptedKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptedKey(<redacted>)")
    }
}

/// Opaque bearer token authorizing protected-resource calls.
///
/// No expiry is tracked client-side; a rejected call is the only expiry
/// signal.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Holder for the two session credentials, scoped to process lifetime.
#[derive(Debug, Default)]
pub struct SessionStore {
    key: Option<EncryptedKey>,
    token: Option<AccessToken>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&EncryptedKey> {
        self.key.as_ref()
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn set_key(&mut self, key: EncryptedKey) {
        self.key = Some(key);
    }

    pub fn set_token(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    /// Drop only the access token, keeping the encrypted key. Used when a
    /// rejected token sends the session back to re-validation.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Drop both credentials.
    pub fn clear(&mut self) {
        self.key = None;
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_starts_empty() {
        let store = SessionStore::new();
        assert!(store.key().is_none());
        assert!(store.token().is_none());
    }

    #[test]
    fn clear_token_keeps_the_key() {
        let mut store = SessionStore::new();
        store.set_key(EncryptedKey::new("ENC123"));
        store.set_token(AccessToken::new("TOK456"));

        store.clear_token();

        assert!(store.token().is_none());
        assert_eq!(store.key().map(EncryptedKey::as_str), Some("ENC123"));
    }

    #[test]
    fn clear_drops_both_credentials() {
        let mut store = SessionStore::new();
        store.set_key(EncryptedKey::new("ENC123"));
        store.set_token(AccessToken::new("TOK456"));

        store.clear();

        assert!(store.key().is_none());
        assert!(store.token().is_none());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let key = EncryptedKey::new("super-secret-key");
        let token = AccessToken::new("super-secret-token");

        let rendered = format!("{key:?} {token:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("super-secret"));
    }
}
