//! Policy document parsing and merging.

use std::collections::HashMap;

use captcha_common::{Policy, PolicyError};
use serde::Deserialize;

/// A policy where every field may be absent
#[derive(Debug, Default, Deserialize)]
struct PolicyFragment {
    min_score: Option<f64>,
    site_key: Option<String>,
    secret_key: Option<String>,
    theme: Option<String>,
    appearance: Option<String>,
}

/// On-disk document shape
#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    provider: String,
    #[serde(default)]
    global: PolicyFragment,
    #[serde(default)]
    actions: HashMap<String, PolicyFragment>,
}

/// Trimmed, non-empty value
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn overlay(target: &mut String, value: &Option<String>) {
    if let Some(v) = present(value) {
        *target = v.to_string();
    }
}

impl PolicyFragment {
    fn apply(&self, base: &Policy) -> Policy {
        let mut policy = base.clone();
        if let Some(score) = self.min_score {
            policy.min_score = score;
        }
        overlay(&mut policy.site_key, &self.site_key);
        overlay(&mut policy.secret_key, &self.secret_key);
        overlay(&mut policy.theme, &self.theme);
        overlay(&mut policy.appearance, &self.appearance);
        policy
    }
}

/// Parsed and merged policy document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    provider: String,
    global: Policy,
    actions: HashMap<String, Policy>,
}

impl PolicySet {
    /// Parse a JSON document, merge each action over `global`, and validate.
    ///
    /// Rejected when `provider` is blank, no action is declared, an action
    /// name is blank, or any merged policy (including `global`) lacks a
    /// site key.
    pub fn from_json(data: &[u8]) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_json::from_slice(data).map_err(|e| {
            PolicyError::InvalidPolicyDocument(format!("could not parse captcha policy config: {e}"))
        })?;

        let provider = document.provider.trim();
        if provider.is_empty() {
            return Err(invalid("captcha policy requires provider"));
        }
        if document.actions.is_empty() {
            return Err(invalid("captcha policy requires at least one action"));
        }

        let global = document.global.apply(&Policy::default());
        if global.site_key.is_empty() {
            return Err(invalid("captcha policy requires a global site_key"));
        }

        let mut actions = HashMap::with_capacity(document.actions.len());
        for (name, fragment) in &document.actions {
            if name.trim().is_empty() {
                return Err(invalid("captcha policy action name cannot be empty"));
            }
            let policy = fragment.apply(&global);
            if policy.site_key.is_empty() {
                return Err(invalid(&format!(
                    "captcha policy action '{name}' has no site_key"
                )));
            }
            actions.insert(name.clone(), policy);
        }

        Ok(Self {
            provider: provider.to_string(),
            global,
            actions,
        })
    }

    /// Policy for `action`, and whether it was declared.
    ///
    /// Undeclared actions get the merged global policy.
    pub fn policy_for(&self, action: &str) -> (&Policy, bool) {
        match self.actions.get(action) {
            Some(policy) => (policy, true),
            None => (&self.global, false),
        }
    }

    /// Declared verification provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn global(&self) -> &Policy {
        &self.global
    }

    /// Declared action names, sorted
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn invalid(reason: &str) -> PolicyError {
    PolicyError::InvalidPolicyDocument(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captcha_common::constants::DEFAULT_MIN_SCORE;

    fn parse(json: &str) -> Result<PolicySet, PolicyError> {
        PolicySet::from_json(json.as_bytes())
    }

    #[test]
    fn test_action_inherits_unset_fields() {
        let set = parse(
            r#"{
                "provider": "google",
                "global": {"min_score": 0.5, "site_key": "sk", "secret_key": "SECRET",
                           "theme": "dark", "appearance": "always"},
                "actions": {"login": {"min_score": 0.9}}
            }"#,
        )
        .unwrap();

        let (login, matched) = set.policy_for("login");
        assert!(matched);
        assert_eq!(login.min_score, 0.9);
        assert_eq!(login.site_key, "sk");
        assert_eq!(login.secret_key, "SECRET");
        assert_eq!(login.theme, "dark");
        assert_eq!(login.appearance, "always");
    }

    #[test]
    fn test_overrides_are_trimmed_and_blank_means_inherit() {
        let set = parse(
            r#"{
                "provider": " turnstile ",
                "global": {"site_key": "global-sk", "secret_key": "GLOBAL_SECRET"},
                "actions": {"search": {"site_key": "  search-sk  ", "secret_key": "   "}}
            }"#,
        )
        .unwrap();

        let (search, _) = set.policy_for("search");
        assert_eq!(search.site_key, "search-sk");
        assert_eq!(search.secret_key, "GLOBAL_SECRET");
        assert_eq!(set.provider(), "turnstile");
    }

    #[test]
    fn test_unknown_action_falls_back_to_global() {
        let set = parse(
            r#"{"provider": "google", "global": {"site_key": "sk"}, "actions": {"login": {"min_score": 0.7}}}"#,
        )
        .unwrap();

        let (policy, matched) = set.policy_for("checkout");
        assert!(!matched);
        assert_eq!(policy, set.global());
        assert_eq!(policy.min_score, DEFAULT_MIN_SCORE);
    }

    #[test]
    fn test_rejects_missing_site_key() {
        let err = parse(
            r#"{"provider": "google", "global": {}, "actions": {"login": {}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPolicyDocument(_)));

        // a per-action key does not cover the global fallback
        assert!(parse(
            r#"{"provider": "google", "global": {}, "actions": {"login": {"site_key": "sk"}}}"#,
        )
        .is_err());
    }

    #[test]
    fn test_rejects_structural_problems() {
        let cases = [
            r#"{"provider": "google", "global": {"site_key": "sk"}, "actions": {}}"#,
            r#"{"provider": "google", "global": {"site_key": "sk"}}"#,
            r#"{"provider": "  ", "global": {"site_key": "sk"}, "actions": {"login": {}}}"#,
            r#"{"global": {"site_key": "sk"}, "actions": {"login": {}}}"#,
            r#"{"provider": "google", "global": {"site_key": "sk"}, "actions": {" ": {}}}"#,
            r#"{"provider": "google", "global": {"min_score": "high"}, "actions": {"a": {}}}"#,
            "not json",
        ];
        for case in cases {
            assert!(
                matches!(parse(case), Err(PolicyError::InvalidPolicyDocument(_))),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn test_action_names_sorted() {
        let set = parse(
            r#"{"provider": "google", "global": {"site_key": "sk"}, "actions": {"search": {}, "login": {}}}"#,
        )
        .unwrap();
        assert_eq!(set.action_names(), vec!["login", "search"]);
    }
}
