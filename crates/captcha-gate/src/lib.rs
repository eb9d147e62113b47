//! # Captcha Gate
//!
//! Gates HTTP endpoints behind Google reCAPTCHA or Cloudflare Turnstile
//! verification, with per-action policies loaded from a JSON document.
//!
//! ## Architecture
//! ```text
//! CaptchaGate → CaptchaService → PolicyStore (cached JSON document)
//!                    ↓                ↓
//!                Verifier      ConfigResolver (env | vault)
//! ```

pub mod config;
pub mod gate;
pub mod policy;
pub mod routes;
pub mod service;
pub mod settings;
pub mod state;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use gate::{CaptchaGate, require_captcha};
pub use service::CaptchaService;
