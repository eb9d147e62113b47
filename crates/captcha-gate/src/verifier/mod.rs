//! Provider siteverify clients.
//!
//! Both providers share the request shape: a form-encoded POST carrying
//! `secret`, `response`, and optionally `remoteip`. They differ only in the
//! endpoint and in whether the answer carries a score.

mod google;
mod turnstile;

pub use google::GoogleVerifier;
pub use turnstile::TurnstileVerifier;

use std::time::Duration;

use captcha_common::constants::PROVIDER_TIMEOUT_SECS;
use captcha_common::constants::endpoints;
use captcha_common::{ProviderKind, ProviderResult, VerifyError};
use serde::de::DeserializeOwned;

/// HTTP client with the fixed provider timeout
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
}

/// Default siteverify URL for a provider
pub fn default_endpoint(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Google => endpoints::GOOGLE,
        ProviderKind::Turnstile => endpoints::TURNSTILE,
    }
}

/// A verifier bound to one secret
pub enum Verifier {
    Google(GoogleVerifier),
    Turnstile(TurnstileVerifier),
}

impl Verifier {
    pub fn new(
        kind: ProviderKind,
        secret: String,
        endpoint: String,
        client: reqwest::Client,
    ) -> Self {
        match kind {
            ProviderKind::Google => Self::Google(GoogleVerifier::new(secret, endpoint, client)),
            ProviderKind::Turnstile => {
                Self::Turnstile(TurnstileVerifier::new(secret, endpoint, client))
            }
        }
    }

    /// Check `token` with the provider. Transport and decode failures are
    /// errors; a rejected token is `Ok` with `success == false`.
    pub async fn verify(&self, token: &str, remote_ip: &str) -> Result<ProviderResult, VerifyError> {
        match self {
            Self::Google(v) => v.verify(token, remote_ip).await,
            Self::Turnstile(v) => v.verify(token, remote_ip).await,
        }
    }
}

/// POST the siteverify form and decode the JSON answer
pub(crate) async fn post_siteverify<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: ProviderKind,
    endpoint: &str,
    secret: &str,
    token: &str,
    remote_ip: &str,
) -> Result<T, VerifyError> {
    let mut form = vec![("secret", secret), ("response", token)];
    if !remote_ip.is_empty() {
        form.push(("remoteip", remote_ip));
    }

    let response = client
        .post(endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(VerifyError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            VerifyError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            VerifyError::Decode {
                provider: provider.to_string(),
                reason: e.to_string(),
            }
        }
    })
}

fn transport_error(provider: ProviderKind, err: reqwest::Error) -> VerifyError {
    if err.is_timeout() {
        VerifyError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        VerifyError::Transport {
            provider: provider.to_string(),
            reason: err.to_string(),
        }
    }
}
