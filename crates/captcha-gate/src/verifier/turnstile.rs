//! Cloudflare Turnstile siteverify. The protocol carries no score.

use captcha_common::{ProviderKind, ProviderResult, VerifyError};
use serde::Deserialize;

use super::post_siteverify;

#[derive(Debug, Deserialize)]
struct TurnstileResponse {
    success: bool,
    #[serde(default)]
    action: String,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct TurnstileVerifier {
    secret: String,
    endpoint: String,
    client: reqwest::Client,
}

impl TurnstileVerifier {
    pub fn new(secret: String, endpoint: String, client: reqwest::Client) -> Self {
        Self {
            secret,
            endpoint,
            client,
        }
    }

    pub async fn verify(&self, token: &str, remote_ip: &str) -> Result<ProviderResult, VerifyError> {
        let raw: TurnstileResponse = post_siteverify(
            &self.client,
            ProviderKind::Turnstile,
            &self.endpoint,
            &self.secret,
            token,
            remote_ip,
        )
        .await?;

        Ok(ProviderResult {
            success: raw.success,
            action: raw.action,
            score: None,
            error_codes: raw.error_codes,
        })
    }
}
