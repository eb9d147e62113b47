//! Verification service: ties a policy to a provider verifier and applies
//! the pass/fail rules.

use std::sync::Arc;
use std::time::Duration;

use captcha_common::{
    ActionMetadata, Policy, PolicyError, ProviderKind, ProviderResult, ServiceError,
    VerificationResult, VerificationStatus,
};

use crate::config::ConfigResolver;
use crate::policy::PolicyStore;
use crate::verifier::{self, Verifier};

/// Answers "is this token valid for this action".
///
/// The provider is fixed at construction from the policy document; a
/// later change of `provider` in the file requires a restart.
pub struct CaptchaService {
    policies: Arc<PolicyStore>,
    config: Arc<ConfigResolver>,
    provider: ProviderKind,
    endpoint: String,
    client: reqwest::Client,
}

impl CaptchaService {
    /// Build the service, reading the policy store once to learn the provider.
    ///
    /// Fails when the policy cannot be loaded or declares an unsupported
    /// provider; both mean the deployment is broken.
    pub async fn new(
        policies: Arc<PolicyStore>,
        config: Arc<ConfigResolver>,
    ) -> Result<Self, ServiceError> {
        let store = policies.current().await?;
        let provider: ProviderKind = store.provider().parse()?;
        let client = verifier::http_client().map_err(|e| ServiceError::HttpClient(e.to_string()))?;

        tracing::info!(provider = %provider, "Captcha service ready");

        Ok(Self {
            policies,
            config,
            provider,
            endpoint: verifier::default_endpoint(provider).to_string(),
            client,
        })
    }

    /// Send siteverify calls to `endpoint` instead of the provider default
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Verify `token` for `expected_action`. Never fails: every failure mode
    /// is reported through the result's status.
    ///
    /// Dropping the returned future aborts the outbound provider call.
    pub async fn verify(
        &self,
        token: &str,
        remote_ip: &str,
        expected_action: &str,
    ) -> VerificationResult {
        let store = match self.policies.current().await {
            Ok(store) => store,
            Err(e) => {
                return failure(VerificationStatus::PolicyError, format!("failed to load policy: {e}"));
            }
        };

        let (policy, matched) = store.policy_for(expected_action);
        if !matched {
            tracing::info!(
                action = %expected_action,
                min_score = policy.min_score,
                "No policy override for action, using default"
            );
        }

        let secret = match self.config.get(&policy.secret_key).await {
            Ok(secret) => secret,
            Err(e) => {
                return failure(
                    VerificationStatus::ConfigError,
                    format!("captcha secret error: failed to load secret '{}': {e}", policy.secret_key),
                );
            }
        };

        let verifier = Verifier::new(
            self.provider,
            secret,
            self.endpoint.clone(),
            self.client.clone(),
        );
        let answer = match verifier.verify(token, remote_ip).await {
            Ok(answer) => answer,
            Err(e) => {
                return failure(VerificationStatus::VerifyError, format!("verify error: {e}"));
            }
        };

        let result = classify(&answer, expected_action, policy);
        if result.success {
            tracing::debug!(action = %expected_action, score = ?answer.score, "Captcha verified");
        } else {
            tracing::debug!(
                action = %expected_action,
                status = %result.status,
                error_codes = ?answer.error_codes,
                "Captcha rejected"
            );
        }
        result
    }

    /// [`verify`](Self::verify) bounded by `timeout`; expiry yields `verify_error`
    pub async fn verify_within(
        &self,
        timeout: Duration,
        token: &str,
        remote_ip: &str,
        expected_action: &str,
    ) -> VerificationResult {
        match tokio::time::timeout(timeout, self.verify(token, remote_ip, expected_action)).await {
            Ok(result) => result,
            Err(_) => failure(
                VerificationStatus::VerifyError,
                format!("verify error: deadline of {}ms exceeded", timeout.as_millis()),
            ),
        }
    }

    /// Widget settings for `action`, without contacting the provider
    pub async fn metadata(&self, action: &str) -> Result<ActionMetadata, PolicyError> {
        let store = self.policies.current().await?;
        let (policy, _) = store.policy_for(action);
        Ok(ActionMetadata {
            action: action.to_string(),
            site_key: policy.site_key.clone(),
            theme: policy.theme.clone(),
            appearance: policy.appearance.clone(),
        })
    }
}

fn failure(status: VerificationStatus, message: String) -> VerificationResult {
    tracing::warn!(status = %status, reason = %message, "Captcha verification failed");
    VerificationResult::failure(status, message)
}

/// Apply the pass/fail rules to a provider answer.
///
/// Order matters: provider failure, then action mismatch, then score.
fn classify(answer: &ProviderResult, expected_action: &str, policy: &Policy) -> VerificationResult {
    if !answer.success {
        return VerificationResult::failure(
            VerificationStatus::SuccessFailed,
            "captcha provider marked challenge as failed",
        );
    }

    if answer.action != expected_action {
        return VerificationResult::failure(
            VerificationStatus::ActionMismatch,
            format!(
                "captcha action mismatch: expected '{expected_action}', got '{}'",
                answer.action
            ),
        );
    }

    if let Some(score) = answer.score {
        if score < policy.min_score {
            return VerificationResult::failure(
                VerificationStatus::ScoreTooLow,
                format!("captcha score too low: {score:.2} < {:.2}", policy.min_score),
            );
        }
    }

    VerificationResult::verified()
}
