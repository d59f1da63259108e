//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TAMARIND_API_BASE_URL` - Base URL of the storefront API
//!
//! ## Optional
//! - `TAMARIND_API_TIMEOUT_SECS` - Per-request timeout in seconds
//!   (default: 8, must be between 1 and 30)
//! - `TAMARIND_TOKEN_PATH` - Where session tokens are persisted
//!   (default: `tamarind/tokens.json` under the platform data directory)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 8;
const MAX_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront API, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout. Kept short so a dead network surfaces as a
    /// failure instead of an indefinite hang.
    pub timeout: Duration,
    /// File the token store persists session tokens to.
    pub token_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or unusable, or if
    /// the timeout is not a whole number of seconds between 1 and 30.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(
            "TAMARIND_API_BASE_URL",
            &get_required_env("TAMARIND_API_BASE_URL")?,
        )?;
        let timeout = parse_timeout(
            "TAMARIND_API_TIMEOUT_SECS",
            &get_env_or_default("TAMARIND_API_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string()),
        )?;
        let token_path = get_optional_env("TAMARIND_TOKEN_PATH")
            .map_or_else(default_token_path, PathBuf::from);

        Ok(Self {
            base_url,
            timeout,
            token_path,
        })
    }

    /// Build a configuration directly, bypassing the environment. Mainly
    /// for tests and for embedding the engine in another program.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_path: token_path.into(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate a base URL and normalize away any trailing slash.
fn parse_base_url(var_name: &str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }

    Ok(raw.trim_end_matches('/').to_owned())
}

/// Parse the request timeout, bounded to keep hangs observable.
fn parse_timeout(var_name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds (got {secs})"),
        ));
    }

    Ok(Duration::from_secs(secs))
}

/// Default location for the token file: platform data dir, with a
/// dotfile in the working directory as the fallback.
fn default_token_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(".tamarind-tokens.json"),
        |dir| dir.join("tamarind").join("tokens.json"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_valid() {
        let url = parse_base_url("TEST_VAR", "https://shop.example.com/api").unwrap();
        assert_eq!(url, "https://shop.example.com/api");
    }

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        let url = parse_base_url("TEST_VAR", "https://shop.example.com/api/").unwrap();
        assert_eq!(url, "https://shop.example.com/api");
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        let result = parse_base_url("TEST_VAR", "not a url");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_base_url_rejects_non_http_scheme() {
        let result = parse_base_url("TEST_VAR", "ftp://shop.example.com");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_timeout_default_is_in_range() {
        let timeout = parse_timeout("TEST_VAR", &DEFAULT_TIMEOUT_SECS.to_string()).unwrap();
        assert_eq!(timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_parse_timeout_rejects_zero() {
        assert!(parse_timeout("TEST_VAR", "0").is_err());
    }

    #[test]
    fn test_parse_timeout_rejects_over_max() {
        assert!(parse_timeout("TEST_VAR", "31").is_err());
        assert!(parse_timeout("TEST_VAR", "9999").is_err());
    }

    #[test]
    fn test_parse_timeout_rejects_non_numeric() {
        assert!(parse_timeout("TEST_VAR", "soon").is_err());
    }

    #[test]
    fn test_new_strips_trailing_slash() {
        let config = ClientConfig::new("http://127.0.0.1:4000/", "/tmp/tokens.json");
        assert_eq!(config.base_url, "http://127.0.0.1:4000");
    }

    #[test]
    fn test_default_token_path_is_not_empty() {
        let path = default_token_path();
        assert!(!path.as_os_str().is_empty());
    }
}
