//! Error types for the KnearMe MCP gateway.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Internal causes stay on the server side; only [`OAuthError`] and
//! [`ToolError::to_user_message`] ever reach a client.

/// Failures while minting a signed token.
///
/// Verification failures are deliberately not represented here: they collapse
/// into a uniform `None` from the issuer.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    /// The JWT library refused to sign the claims.
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Issued-at plus lifetime does not fit in a timestamp.
    #[error("token lifetime out of range: {0:?}")]
    LifetimeOutOfRange(std::time::Duration),
}

/// Errors from a backing store (authorization codes or profiles).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Any other backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors from MCP tool execution.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A collaborator store failed underneath the tool
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal tool logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Convert to a user-friendly error message for MCP response.
    ///
    /// Store failures are reported generically; their detail is only logged.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Validation { field, message } => {
                format!("Invalid input for '{field}': {message}")
            }
            Self::Store(_) => "The data store is temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Token endpoint failures, in the RFC 6749 §5.2 vocabulary.
///
/// The description is human text for the client; it never carries internal
/// detail.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_client: {0}")]
    InvalidClient(String),

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("server_error")]
    ServerError,
}

impl OAuthError {
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidRequest(description.into())
    }

    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::InvalidClient(description.into())
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::InvalidGrant(description.into())
    }

    /// The `error` field of the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::ServerError => "server_error",
        }
    }

    /// The `error_description` field of the response body.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::UnsupportedGrantType(d) => d,
            Self::ServerError => "The authorization server encountered an unexpected error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidClient(_) => 401,
            Self::ServerError => 500,
            _ => 400,
        }
    }
}

/// Invalid process configuration, reported at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// The signing key is too short to be trusted for HMAC.
    #[error("signing key must be at least {min} bytes, got {len}")]
    SigningKeyTooShort {
        /// Supplied key length
        len: usize,
        /// Minimum accepted length
        min: usize,
    },

    /// A numeric setting failed to parse.
    #[error("{var} must be a positive integer number of seconds, got {value:?}")]
    InvalidSeconds {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// A lifetime was configured as zero.
    #[error("{0} must be greater than zero")]
    ZeroLifetime(&'static str),

    /// The public base URL does not parse.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
