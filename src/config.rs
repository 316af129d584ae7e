//! Configuration system for the CRS auth client.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! All configuration options can be overridden via environment variables:
//! - `CRS_BASE_URL` - Base URL of the token-issuing service
//! - `CRS_REQUEST_TIMEOUT_SECS` - Per-request timeout in seconds
//! - `CRS_ISSUE_FLOOR_MS` - Minimum wall-clock duration of the issuance call
//! - `CRS_ACCEPT_INVALID_CERTS` - Accept self-signed TLS certificates (dev only)
//! - `CRS_LOGGING_ENABLED` - Enable tracing output in the CLI
//! - `CRS_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{AuthError, AuthResult};

/// Global configuration singleton.
static CONFIG: OnceLock<CrsConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrsConfig {
    /// Token service API configuration
    pub api: ApiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Token service API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the token-issuing service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Minimum wall-clock duration of the issuance operation in milliseconds
    pub issue_floor_ms: u64,
    /// Accept self-signed TLS certificates (development servers only)
    pub accept_invalid_certs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7121".to_string(),
            request_timeout_secs: 30,
            issue_floor_ms: 3000,
            accept_invalid_certs: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

impl CrsConfig {
    /// Load a fresh configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    ///
    /// Bypasses the process-wide cache; use [`get_config`] in application
    /// code.
    pub fn load() -> AuthResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("api.base_url", "https://localhost:7121")
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_default("api.request_timeout_secs", 30)
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_default("api.issue_floor_ms", 3000)
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_default("api.accept_invalid_certs", false)
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_default("logging.enabled", false)
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| AuthError::Config(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("api.base_url", env::var("CRS_BASE_URL").ok())
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_override_option(
                "api.request_timeout_secs",
                env::var("CRS_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_override_option(
                "api.issue_floor_ms",
                env::var("CRS_ISSUE_FLOOR_MS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_override_option(
                "api.accept_invalid_certs",
                env::var("CRS_ACCEPT_INVALID_CERTS")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env::var("CRS_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| AuthError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("CRS_LOG_LEVEL").ok())
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AuthError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AuthResult<()> {
        // Validate base URL
        if self.api.base_url.is_empty() {
            return Err(AuthError::Config(
                "api.base_url cannot be empty".to_string(),
            ));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(AuthError::Config(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                self.api.base_url
            )));
        }

        // Validate timeout
        if self.api.request_timeout_secs == 0 {
            return Err(AuthError::Config(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate log level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(AuthError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> AuthResult<&'static CrsConfig> {
    // Check if already initialized
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    // Load and validate configuration
    let config = CrsConfig::load()?;
    config.validate()?;

    // Try to set it (ignore if another thread beat us)
    let _ = CONFIG.set(config.clone());

    // Return the stored config (either ours or another thread's)
    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
/// Returns the validated configuration.
pub fn init_config() -> AuthResult<&'static CrsConfig> {
    get_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CrsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.issue_floor_ms, 3000);
        assert_eq!(config.api.request_timeout_secs, 30);
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let mut config = CrsConfig::default();
        config.api.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_without_scheme_is_rejected() {
        let mut config = CrsConfig::default();
        config.api.base_url = "localhost:7121".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = CrsConfig::default();
        config.api.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = CrsConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
