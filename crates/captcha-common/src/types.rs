//! Core types shared across Captcha Gate components.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIN_SCORE;
use crate::error::ServiceError;

/// Resolved verification parameters for one action.
///
/// `secret_key` names a configuration key; the secret itself is resolved
/// through the configuration layer at verification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub min_score: f64,
    pub site_key: String,
    pub secret_key: String,
    pub theme: String,
    pub appearance: String,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            site_key: String::new(),
            secret_key: String::new(),
            theme: String::new(),
            appearance: String::new(),
        }
    }
}

/// Verification provider declared by the policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google reCAPTCHA (v3 reports a score)
    Google,
    /// Cloudflare Turnstile (never reports a score)
    Turnstile,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Turnstile => "turnstile",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ServiceError;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "turnstile" => Ok(Self::Turnstile),
            _ => Err(ServiceError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Normalized answer from a provider siteverify call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResult {
    pub success: bool,
    pub action: String,
    /// `None` when the provider protocol carries no score
    pub score: Option<f64>,
    pub error_codes: Vec<String>,
}

/// Outcome classification reported to the boundary layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No token on the request (produced by the gate, never by the service)
    TokenMissing,
    /// Policy document could not be loaded
    PolicyError,
    /// Secret key could not be resolved
    ConfigError,
    /// Provider call failed in transport or decoding
    VerifyError,
    /// Provider marked the challenge as failed
    SuccessFailed,
    /// Echoed action differs from the expected one
    ActionMismatch,
    /// Score strictly below the policy floor
    ScoreTooLow,
    Verified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenMissing => "token_missing",
            Self::PolicyError => "policy_error",
            Self::ConfigError => "config_error",
            Self::VerifyError => "verify_error",
            Self::SuccessFailed => "success_failed",
            Self::ActionMismatch => "action_mismatch",
            Self::ScoreTooLow => "score_too_low",
            Self::Verified => "verified",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible verification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub status: VerificationStatus,
    pub message: String,
}

impl VerificationResult {
    pub fn verified() -> Self {
        Self {
            success: true,
            status: VerificationStatus::Verified,
            message: "captcha verification passed".to_string(),
        }
    }

    /// A failed result; `status` must not be `Verified`
    pub fn failure(status: VerificationStatus, message: impl Into<String>) -> Self {
        debug_assert_ne!(status, VerificationStatus::Verified);
        Self {
            success: false,
            status,
            message: message.into(),
        }
    }

    pub fn token_missing() -> Self {
        Self::failure(VerificationStatus::TokenMissing, "missing captcha token")
    }
}

/// Frontend-facing configuration for rendering a challenge widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub action: String,
    pub site_key: String,
    pub theme: String,
    pub appearance: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(" Google ".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("TURNSTILE".parse::<ProviderKind>().unwrap(), ProviderKind::Turnstile);
        assert!("hcaptcha".parse::<ProviderKind>().is_err());
        assert!("".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_status_wire_names() {
        let result = VerificationResult::failure(VerificationStatus::ScoreTooLow, "low");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "score_too_low");
        assert_eq!(json["success"], false);

        let ok = serde_json::to_value(VerificationResult::verified()).unwrap();
        assert_eq!(ok["status"], VerificationStatus::Verified.as_str());
    }

    #[test]
    fn test_default_policy_min_score() {
        assert_eq!(Policy::default().min_score, DEFAULT_MIN_SCORE);
    }
}
