//! Configuration management for the Captcha Gate server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use captcha_common::constants::{
    DEFAULT_BODY_LIMIT_BYTES, DEFAULT_LISTEN_ADDR, DEFAULT_VERIFY_TIMEOUT_MS,
};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Deadline for one verification attempt, provider call included
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// Maximum request body buffered while looking for a token
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_verify_timeout_ms() -> u64 { DEFAULT_VERIFY_TIMEOUT_MS }
fn default_body_limit() -> usize { DEFAULT_BODY_LIMIT_BYTES }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, listen_override: Option<&str>) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = ::config::Config::builder()
                .add_source(::config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        if let Some(listen) = listen_override {
            config.listen_addr = listen.to_string();
        }

        Ok(config)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            verify_timeout_ms: default_verify_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}
