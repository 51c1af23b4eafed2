//! Configuration for the KnearMe MCP gateway.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Default lifetimes and protocol constants.
pub mod defaults {
    use std::time::Duration;

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Refresh token lifetime (7 days).
    pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

    /// Authorization code lifetime (5 minutes).
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(300);

    /// How often the in-memory code store sweeps expired codes.
    pub const CODE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    /// Upper bound on remembered rotated refresh tokens.
    pub const ROTATION_LEDGER_CAPACITY: u64 = 100_000;

    /// Scope reported when a grant carries none.
    pub const SCOPE: &str = "mcp";

    /// MCP protocol version announced when the client does not request one.
    pub const PROTOCOL_VERSION: &str = "2025-03-26";

    /// Public base URL used in discovery documents.
    pub const BASE_URL: &str = "http://localhost:8000";

    /// Default OAuth client identifier.
    pub const CLIENT_ID: &str = "knearme-mcp";

    /// Minimum HMAC signing key length in bytes.
    pub const MIN_SIGNING_KEY_LEN: usize = 32;

    /// In-flight HTTP requests across all connections.
    pub const MAX_CONCURRENT_REQUESTS: usize = 512;
}

/// HMAC key used to sign and verify tokens.
///
/// Loaded once at startup and injected into the token issuer. Never printed.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap raw key material, rejecting keys shorter than 32 bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.len() < defaults::MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::SigningKeyTooShort {
                len: bytes.len(),
                min: defaults::MIN_SIGNING_KEY_LEN,
            });
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("len", &self.0.len()).finish()
    }
}

/// The single statically configured OAuth client.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    /// `None` (or empty) for public clients.
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Public client: no secret configured.
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self::new(client_id, None)
    }

    #[must_use]
    pub const fn has_secret(&self) -> bool {
        self.client_secret.is_some()
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("has_secret", &self.has_secret())
            .finish()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token signing key.
    pub signing_key: SigningKey,

    /// Configured OAuth client.
    pub client: ClientCredentials,

    /// Access token lifetime.
    pub access_token_ttl: Duration,

    /// Refresh token lifetime.
    pub refresh_token_ttl: Duration,

    /// Authorization code lifetime.
    pub auth_code_ttl: Duration,

    /// Remember rotated-away refresh tokens and reject their reuse.
    pub rotation_ledger: bool,

    /// Public base URL (no trailing slash).
    pub base_url: String,

    /// Scope reported when a grant carries none.
    pub default_scope: String,
}

impl Config {
    /// Create a configuration with default lifetimes.
    #[must_use]
    pub fn new(signing_key: SigningKey, client: ClientCredentials) -> Self {
        Self {
            signing_key,
            client,
            access_token_ttl: defaults::ACCESS_TOKEN_TTL,
            refresh_token_ttl: defaults::REFRESH_TOKEN_TTL,
            auth_code_ttl: defaults::AUTH_CODE_TTL,
            rotation_ledger: false,
            base_url: defaults::BASE_URL.to_string(),
            default_scope: defaults::SCOPE.to_string(),
        }
    }

    /// Create a test configuration with a fixed key and a confidential client.
    #[must_use]
    pub fn for_testing() -> Self {
        let key = SigningKey(b"test-signing-key-0123456789abcdef-not-for-production".to_vec());
        let client = ClientCredentials::new("test-client", Some("test-secret".to_string()));
        let mut config = Self::new(key, client);
        config.base_url = "https://mcp.example.test".to_string();
        config
    }

    /// Replace the public base URL, validating it and dropping any trailing slash.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        url::Url::parse(base_url)?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Create configuration from environment variables.
    ///
    /// `KNEARME_MCP_SIGNING_KEY` is required; everything else has a default.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is missing or malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        let key = std::env::var("KNEARME_MCP_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("KNEARME_MCP_SIGNING_KEY"))?;
        let client_id = std::env::var("KNEARME_MCP_CLIENT_ID")
            .unwrap_or_else(|_| defaults::CLIENT_ID.to_string());
        let client_secret = std::env::var("KNEARME_MCP_CLIENT_SECRET").ok();

        let signing_key = SigningKey::new(key.into_bytes())?;
        let mut config = Self::new(signing_key, ClientCredentials::new(client_id, client_secret));

        if let Some(ttl) = env_seconds("KNEARME_MCP_ACCESS_TTL_SECS")? {
            config.access_token_ttl = ttl;
        }
        if let Some(ttl) = env_seconds("KNEARME_MCP_REFRESH_TTL_SECS")? {
            config.refresh_token_ttl = ttl;
        }
        if let Some(ttl) = env_seconds("KNEARME_MCP_CODE_TTL_SECS")? {
            config.auth_code_ttl = ttl;
        }
        config.rotation_ledger = std::env::var("KNEARME_MCP_ROTATION_LEDGER")
            .is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));
        if let Ok(base_url) = std::env::var("BASE_URL") {
            config = config.with_base_url(&base_url)?;
        }

        Ok(config)
    }

    /// Access token lifetime in whole seconds, as reported in `expires_in`.
    #[must_use]
    pub const fn access_token_ttl_secs(&self) -> u64 {
        self.access_token_ttl.as_secs()
    }
}

/// Read an optional positive number of seconds from the environment.
fn env_seconds(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    parse_seconds(var, &raw).map(Some)
}

fn parse_seconds(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSeconds {
            var,
            value: raw.to_string(),
        })?;
    if secs == 0 {
        return Err(ConfigError::ZeroLifetime(var));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::for_testing();
        assert_eq!(config.access_token_ttl_secs(), 3600);
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(604_800));
        assert_eq!(config.auth_code_ttl, Duration::from_secs(300));
        assert!(!config.rotation_ledger);
        assert_eq!(config.default_scope, "mcp");
    }

    #[test]
    fn test_short_signing_key_rejected() {
        let err = SigningKey::new(b"short".to_vec()).unwrap_err();
        assert!(matches!(err, ConfigError::SigningKeyTooShort { len: 5, min: 32 }));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config::for_testing();
        let debug = format!("{config:?}");
        assert!(!debug.contains("test-secret"));
        assert!(!debug.contains("not-for-production"));
        assert!(debug.contains("has_secret"));
    }

    #[test]
    fn test_empty_secret_means_public_client() {
        let client = ClientCredentials::new("abc", Some(String::new()));
        assert!(!client.has_secret());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = Config::for_testing().with_base_url("https://knearme.co/").unwrap();
        assert_eq!(config.base_url, "https://knearme.co");
        assert!(Config::for_testing().with_base_url("not a url").is_err());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("X", "90").unwrap(), Duration::from_secs(90));
        assert!(matches!(parse_seconds("X", "0"), Err(ConfigError::ZeroLifetime("X"))));
        assert!(matches!(parse_seconds("X", "ten"), Err(ConfigError::InvalidSeconds { .. })));
    }
}
