//! Google reCAPTCHA siteverify.

use captcha_common::{ProviderKind, ProviderResult, VerifyError};
use serde::Deserialize;

use super::post_siteverify;

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    success: bool,
    score: Option<f64>,
    #[serde(default)]
    action: String,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct GoogleVerifier {
    secret: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleVerifier {
    pub fn new(secret: String, endpoint: String, client: reqwest::Client) -> Self {
        Self {
            secret,
            endpoint,
            client,
        }
    }

    /// The score is always reported; an omitted score counts as 0.0.
    pub async fn verify(&self, token: &str, remote_ip: &str) -> Result<ProviderResult, VerifyError> {
        let raw: GoogleResponse = post_siteverify(
            &self.client,
            ProviderKind::Google,
            &self.endpoint,
            &self.secret,
            token,
            remote_ip,
        )
        .await?;

        Ok(ProviderResult {
            success: raw.success,
            action: raw.action,
            score: Some(raw.score.unwrap_or_default()),
            error_codes: raw.error_codes,
        })
    }
}
