//! Application state and shared resources.

use std::sync::Arc;

use crate::gate::CaptchaGate;
use crate::service::CaptchaService;
use crate::settings::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: AppConfig,

    /// Verification service (policy store and config resolver inside)
    pub service: Arc<CaptchaService>,
}

impl AppState {
    pub fn new(config: AppConfig, service: Arc<CaptchaService>) -> Self {
        Self { config, service }
    }

    /// Gate for `action` using the configured deadline and body limit
    pub fn gate(&self, action: &str) -> CaptchaGate {
        CaptchaGate::new(self.service.clone(), action)
            .with_timeout(self.config.verify_timeout())
            .with_body_limit(self.config.body_limit_bytes)
    }
}
