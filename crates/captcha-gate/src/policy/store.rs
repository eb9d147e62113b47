//! Policy cache keyed by file path and modification time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use captcha_common::PolicyError;
use captcha_common::constants::env::CAPTCHA_CONFIG;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::PolicySet;
use crate::config::ConfigResolver;

struct CachedPolicies {
    path: PathBuf,
    modified: SystemTime,
    policies: Arc<PolicySet>,
}

impl CachedPolicies {
    fn matches(&self, path: &Path, modified: SystemTime) -> bool {
        self.path == path && self.modified == modified
    }
}

/// Loads the policy document named by `CAPTCHA_CONFIG` and caches it until
/// the file's modification time changes.
///
/// Lookups take the cache lock shared; a reload takes it exclusively and
/// re-checks before parsing, so concurrent callers never reload twice for
/// the same change and never observe a partially built set.
pub struct PolicyStore {
    config: Arc<ConfigResolver>,
    cache: RwLock<Option<CachedPolicies>>,
    reloads: AtomicU64,
}

impl PolicyStore {
    pub fn new(config: Arc<ConfigResolver>) -> Self {
        Self {
            config,
            cache: RwLock::new(None),
            reloads: AtomicU64::new(0),
        }
    }

    /// The up-to-date policy set, reloading from disk only when the file changed.
    ///
    /// A document that fails to parse leaves the previous cache in place; the
    /// next call retries.
    pub async fn current(&self) -> Result<Arc<PolicySet>, PolicyError> {
        let path = self.resolve_path().await?;
        let modified = modified_time(&path).await?;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.matches(&path, modified)) {
                return Ok(cached.policies.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.matches(&path, modified)) {
            return Ok(cached.policies.clone());
        }

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| unreadable(&path, e))?;
        let policies = match PolicySet::from_json(&data) {
            Ok(set) => Arc::new(set),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Policy reload rejected");
                return Err(e);
            }
        };

        self.reloads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            path = %path.display(),
            modified = %DateTime::<Utc>::from(modified).to_rfc3339(),
            provider = %policies.provider(),
            actions = policies.action_names().len(),
            "Captcha policy loaded"
        );

        *cache = Some(CachedPolicies {
            path,
            modified,
            policies: policies.clone(),
        });
        Ok(policies)
    }

    /// Number of successful parses installed so far
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    async fn resolve_path(&self) -> Result<PathBuf, PolicyError> {
        let value = self
            .config
            .get(CAPTCHA_CONFIG)
            .await
            .map_err(|_| PolicyError::MissingPolicyPath)?;

        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::MissingPolicyPath);
        }
        Ok(PathBuf::from(trimmed))
    }
}

async fn modified_time(path: &Path) -> Result<SystemTime, PolicyError> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_err(|e| unreadable(path, e))
}

fn unreadable(path: &Path, err: std::io::Error) -> PolicyError {
    PolicyError::PolicyFileUnreadable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySource;
    use crate::testing::{LOGIN_POLICY, bump_modified, write_policy};
    use tempfile::TempDir;

    fn store_for(path: &Path) -> PolicyStore {
        let source = MemorySource::new().with(CAPTCHA_CONFIG, path.display().to_string());
        PolicyStore::new(Arc::new(ConfigResolver::with_source(Arc::new(source))))
    }

    #[tokio::test]
    async fn test_unchanged_file_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let path = write_policy(&dir, LOGIN_POLICY);
        let store = store_for(&path);

        let first = store.current().await.unwrap();
        let second = store.current().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_touch_triggers_exactly_one_reload() {
        let dir = TempDir::new().unwrap();
        let path = write_policy(&dir, LOGIN_POLICY);
        let store = store_for(&path);

        let before = store.current().await.unwrap();
        bump_modified(&path, 10);

        let after = store.current().await.unwrap();
        let again = store.current().await.unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&after, &again));
        assert_eq!(*before, *after);
        assert_eq!(store.reload_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_reload() {
        let dir = TempDir::new().unwrap();
        let path = write_policy(&dir, LOGIN_POLICY);
        let store = Arc::new(store_for(&path));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.current().await.unwrap() })
            })
            .collect();

        let mut sets = Vec::new();
        for handle in handles {
            sets.push(handle.await.unwrap());
        }

        assert_eq!(store.reload_count(), 1);
        assert!(sets.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_invalid_rewrite_keeps_old_set_and_retries() {
        let dir = TempDir::new().unwrap();
        let path = write_policy(&dir, LOGIN_POLICY);
        let store = store_for(&path);

        let held = store.current().await.unwrap();

        std::fs::write(&path, r#"{"provider": "google", "actions": {}}"#).unwrap();
        bump_modified(&path, 10);
        assert!(matches!(
            store.current().await,
            Err(PolicyError::InvalidPolicyDocument(_))
        ));
        tokio_test::assert_err!(store.current().await);
        assert_eq!(held.provider(), "google");

        std::fs::write(&path, LOGIN_POLICY).unwrap();
        bump_modified(&path, 20);
        tokio_test::assert_ok!(store.current().await);
        assert_eq!(store.reload_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_path_and_missing_file() {
        let blank = MemorySource::new().with(CAPTCHA_CONFIG, "   ");
        let store = PolicyStore::new(Arc::new(ConfigResolver::with_source(Arc::new(blank))));
        assert!(matches!(
            store.current().await,
            Err(PolicyError::MissingPolicyPath)
        ));

        let unset = PolicyStore::new(Arc::new(ConfigResolver::with_source(Arc::new(
            MemorySource::new(),
        ))));
        assert!(matches!(
            unset.current().await,
            Err(PolicyError::MissingPolicyPath)
        ));

        let dir = TempDir::new().unwrap();
        let store = store_for(&dir.path().join("absent.json"));
        assert!(matches!(
            store.current().await,
            Err(PolicyError::PolicyFileUnreadable { .. })
        ));
    }
}
