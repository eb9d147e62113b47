//! HashiCorp Vault KV v2 configuration source.
//!
//! Environment variables override Vault: a key set in the process
//! environment is returned without contacting the server.

use std::time::Duration;

use async_trait::async_trait;
use captcha_common::ConfigError;
use captcha_common::constants::SECRET_STORE_TIMEOUT_SECS;
use captcha_common::constants::env::{DEFAULT_VAULT_MOUNT, VAULT_ADDR, VAULT_PATH, VAULT_TOKEN};
use serde_json::Value;

use super::ConfigSource;

/// Connection settings for the Vault source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: String,
    pub token: String,
    /// KV v2 mount path
    pub mount: String,
}

impl VaultSettings {
    /// Read `VAULT_ADDR`, `VAULT_TOKEN`, and `VAULT_PATH`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (Some(address), Some(token)) = (read(VAULT_ADDR), read(VAULT_TOKEN)) else {
            return Err(ConfigError::MisconfiguredSource(format!(
                "vault config requires {VAULT_ADDR} and {VAULT_TOKEN}"
            )));
        };

        Ok(Self {
            address,
            token,
            mount: read(VAULT_PATH).unwrap_or_else(|| DEFAULT_VAULT_MOUNT.to_string()),
        })
    }

    fn secret_url(&self, key: &str) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address.trim_end_matches('/'),
            self.mount.trim_matches('/'),
            key
        )
    }
}

/// Fetches values from the `value` field of Vault KV v2 secrets
pub struct VaultSource {
    settings: VaultSettings,
    client: reqwest::Client,
}

impl VaultSource {
    pub fn new(settings: VaultSettings) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SECRET_STORE_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::MisconfiguredSource(format!("vault client init error: {e}")))?;

        Ok(Self { settings, client })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(VaultSettings::from_env()?)
    }

    async fn fetch(&self, key: &str) -> Result<String, ConfigError> {
        let response = self
            .client
            .get(self.settings.secret_url(key))
            .header("X-Vault-Token", &self.settings.token)
            .send()
            .await
            .map_err(|e| ConfigError::RemoteError(format!("vault read error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::RemoteError(format!(
                "vault read error: HTTP {} for '{key}'",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ConfigError::RemoteError(format!("vault decode error: {e}")))?;

        body.pointer("/data/data/value")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ConfigSource for VaultSource {
    fn name(&self) -> &'static str {
        "vault"
    }

    async fn get(&self, key: &str) -> Result<String, ConfigError> {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => return Ok(value),
            _ => {}
        }

        let value = self.fetch(key).await;
        if let Err(e) = &value {
            tracing::debug!(key = %key, error = %e, "Vault lookup failed");
        }
        value
    }
}
