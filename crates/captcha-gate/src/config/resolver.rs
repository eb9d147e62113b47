//! One-time configuration source selection.

use std::sync::Arc;

use captcha_common::ConfigError;
use captcha_common::constants::env::CONFIG_PROVIDER;
use tokio::sync::OnceCell;

use super::{ConfigSource, EnvSource, VaultSource};

type Selected = Result<Arc<dyn ConfigSource>, ConfigError>;

/// Resolves configuration keys through a single, lazily selected source.
///
/// The first caller selects the source; concurrent first callers wait for
/// that selection and observe the same outcome. A failed selection is kept
/// and returned to every later caller.
pub struct ConfigResolver {
    /// Provider name override; `None` reads `CONFIG_PROVIDER`
    provider: Option<String>,
    source: OnceCell<Selected>,
}

impl ConfigResolver {
    /// Select the source from `CONFIG_PROVIDER` on first use
    pub fn from_env() -> Self {
        Self {
            provider: None,
            source: OnceCell::new(),
        }
    }

    /// Select the named source on first use, ignoring `CONFIG_PROVIDER`
    pub fn with_provider(name: impl Into<String>) -> Self {
        Self {
            provider: Some(name.into()),
            source: OnceCell::new(),
        }
    }

    /// Use an already constructed source
    pub fn with_source(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            provider: None,
            source: OnceCell::new_with(Some(Ok(source))),
        }
    }

    async fn source(&self) -> Result<&Arc<dyn ConfigSource>, ConfigError> {
        let selected = self.source.get_or_init(|| async { self.select() }).await;
        selected.as_ref().map_err(Clone::clone)
    }

    fn select(&self) -> Selected {
        let name = match &self.provider {
            Some(name) => name.clone(),
            None => std::env::var(CONFIG_PROVIDER).unwrap_or_default(),
        };

        let selected = source_for(&name);
        match &selected {
            Ok(source) => tracing::info!(source = source.name(), "Config source selected"),
            Err(e) => tracing::error!(error = %e, "Config source selection failed"),
        }
        selected
    }

    /// Name of the selected source, if selection already succeeded
    pub fn source_name(&self) -> Option<&'static str> {
        match self.source.get() {
            Some(Ok(source)) => Some(source.name()),
            _ => None,
        }
    }

    pub async fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.source().await?.get(key).await
    }

    /// Never fails: any error or empty value yields `fallback`
    pub async fn get_or_default(&self, key: &str, fallback: &str) -> String {
        match self.get(key).await {
            Ok(value) if !value.is_empty() => value,
            _ => fallback.to_string(),
        }
    }

    /// Resolve a key whose absence is a deployment error.
    ///
    /// # Panics
    ///
    /// Panics if the key cannot be resolved. Not for request paths.
    pub async fn must_get(&self, key: &str) -> String {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => panic!("required config key '{key}' unavailable: {e}"),
        }
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Construct the source named by `name` (trimmed, case-insensitive, blank = `env`)
pub fn source_for(name: &str) -> Selected {
    let normalized = name.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "env" => Ok(Arc::new(EnvSource::new())),
        "vault" => Ok(Arc::new(VaultSource::from_env()?)),
        _ => Err(ConfigError::UnknownProvider(normalized)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySource;
    use captcha_common::constants::env::{VAULT_ADDR, VAULT_TOKEN};

    #[test]
    fn test_source_for_names() {
        assert_eq!(source_for("").unwrap().name(), "env");
        assert_eq!(source_for("  ENV ").unwrap().name(), "env");
        assert_eq!(
            source_for("Consul").err(),
            Some(ConfigError::UnknownProvider("consul".into()))
        );
    }

    #[tokio::test]
    async fn test_failed_selection_is_cached_for_all_callers() {
        let resolver = Arc::new(ConfigResolver::with_provider("etcd"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.get("ANY").await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert_eq!(err, ConfigError::UnknownProvider("etcd".into()));
        }
        assert_eq!(resolver.source_name(), None);
    }

    #[tokio::test]
    async fn test_get_or_default_and_must_get() {
        let source = MemorySource::new().with("PRESENT", "value");
        let resolver = ConfigResolver::with_source(Arc::new(source));

        assert_eq!(resolver.source_name(), Some("memory"));
        assert_eq!(resolver.get_or_default("PRESENT", "fb").await, "value");
        assert_eq!(resolver.get_or_default("ABSENT", "fb").await, "fb");
        assert_eq!(resolver.must_get("PRESENT").await, "value");
    }

    #[tokio::test]
    #[should_panic(expected = "ABSENT")]
    async fn test_must_get_panics_on_missing_key() {
        let resolver = ConfigResolver::with_source(Arc::new(MemorySource::new()));
        resolver.must_get("ABSENT").await;
    }

    #[tokio::test]
    async fn test_get_or_default_on_failed_selection() {
        let resolver = ConfigResolver::with_provider("nope");
        assert_eq!(resolver.get_or_default("KEY", "fallback").await, "fallback");
    }

    #[tokio::test]
    async fn test_vault_without_settings_is_misconfigured() {
        if std::env::var_os(VAULT_ADDR).is_some() || std::env::var_os(VAULT_TOKEN).is_some() {
            return;
        }
        let resolver = ConfigResolver::with_provider(" Vault ");

        let err = resolver.get("SECRET").await.unwrap_err();
        assert!(matches!(err, ConfigError::MisconfiguredSource(_)));
        assert!(!err.is_retryable());
        assert_eq!(resolver.get("SECRET").await.unwrap_err(), err);
        assert_eq!(resolver.source_name(), None);
    }
}
