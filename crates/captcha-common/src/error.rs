//! Common error types for Captcha Gate components.

use thiserror::Error;

/// Errors raised while resolving a configuration key.
///
/// `Clone` so that a failed one-time source selection can be cached and
/// returned to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Key unset, empty, or carrying no usable value
    #[error("config key not found: {0}")]
    NotFound(String),

    /// Source selected but its own settings are incomplete
    #[error("config source misconfigured: {0}")]
    MisconfiguredSource(String),

    /// Remote secret store could not be reached or answered with an error
    #[error("remote config error: {0}")]
    RemoteError(String),

    /// `CONFIG_PROVIDER` names a source this build does not know
    #[error("unknown config provider: {0}")]
    UnknownProvider(String),
}

impl ConfigError {
    /// Returns true if a later attempt could succeed without redeploying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteError(_))
    }
}

/// Errors raised while loading the policy document
#[derive(Debug, Error)]
pub enum PolicyError {
    /// `CAPTCHA_CONFIG` unset or blank
    #[error("CAPTCHA_CONFIG must be set")]
    MissingPolicyPath,

    /// Path resolved but the file could not be stat'd or read
    #[error("could not read captcha policy config ({path}): {reason}")]
    PolicyFileUnreadable { path: String, reason: String },

    /// JSON malformed or failed validation
    #[error("invalid captcha policy config: {0}")]
    InvalidPolicyDocument(String),
}

/// Errors from a provider siteverify call
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Connection, TLS, or request-building failure
    #[error("{provider} transport error: {reason}")]
    Transport { provider: String, reason: String },

    /// Provider did not answer within the allowed time
    #[error("{provider} verification timed out")]
    Timeout { provider: String },

    /// Provider answered with a non-success HTTP status
    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    /// Response body was not the expected JSON shape
    #[error("{provider} decode error: {reason}")]
    Decode { provider: String, reason: String },
}

/// Errors raised while constructing the verification service.
///
/// These indicate a broken deployment rather than a transient condition.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Policy document unavailable at startup
    #[error("failed to load CAPTCHA config: {0}")]
    Policy(#[from] PolicyError),

    /// HTTP client for provider calls could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Document declares a provider other than `google` or `turnstile`
    #[error("invalid captcha provider '{0}' (turnstile|google)")]
    UnsupportedProvider(String),
}
