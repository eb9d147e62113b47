//! Configuration sources and the process-wide resolver.
//!
//! A [`ConfigSource`] turns a key into a string. The [`ConfigResolver`]
//! picks one source on first use (from `CONFIG_PROVIDER`) and keeps it for
//! its whole lifetime.

mod resolver;
mod vault;

pub use resolver::{ConfigResolver, source_for};
pub use vault::{VaultSettings, VaultSource};

use async_trait::async_trait;
use captcha_common::ConfigError;
use std::collections::HashMap;

/// A backend that can provide configuration values
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Short identifier used in logs (`env`, `vault`, ...)
    fn name(&self) -> &'static str;

    /// Resolve `key`, failing with [`ConfigError::NotFound`] when absent or empty
    async fn get(&self, key: &str) -> Result<String, ConfigError>;
}

/// Reads the process environment directly
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl EnvSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn get(&self, key: &str) -> Result<String, ConfigError> {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::NotFound(key.to_string())),
        }
    }
}

/// Fixed in-memory key/value map, for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    values: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_source_missing_key() {
        let source = EnvSource::new();
        let err = source
            .get("CAPTCHA_GATE_TEST_DEFINITELY_UNSET_KEY")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotFound("CAPTCHA_GATE_TEST_DEFINITELY_UNSET_KEY".into())
        );
    }

    #[tokio::test]
    async fn test_memory_source_treats_empty_as_missing() {
        let source: MemorySource = [("SECRET", "s3cr3t"), ("BLANK", "")].into_iter().collect();

        assert_eq!(source.get("SECRET").await.unwrap(), "s3cr3t");
        assert!(matches!(
            source.get("BLANK").await,
            Err(ConfigError::NotFound(_))
        ));
        assert!(matches!(
            source.get("OTHER").await,
            Err(ConfigError::NotFound(_))
        ));
    }
}
