//! # Captcha Common
//!
//! Shared types, errors, and constants used across Captcha Gate components.
//!
//! ## Modules
//! - `types` - Policy model and verification outcomes
//! - `error` - Error taxonomy for configuration, policy, and verification
//! - `constants` - Environment variable names, provider endpoints, defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ConfigError, PolicyError, ServiceError, VerifyError};
pub use types::*;
