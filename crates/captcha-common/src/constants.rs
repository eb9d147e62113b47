//! Shared constants for Captcha Gate components.

/// Score floor applied when neither `global` nor the action sets `min_score`
pub const DEFAULT_MIN_SCORE: f64 = 0.5;

/// Default HTTP listen address for the sidecar server
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Fixed upper bound for a single provider siteverify call (seconds)
pub const PROVIDER_TIMEOUT_SECS: u64 = 5;

/// Upper bound for a single secret store read (seconds)
pub const SECRET_STORE_TIMEOUT_SECS: u64 = 5;

/// Deadline for a whole verification attempt made by the gate (milliseconds)
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 6_000;

/// Maximum request body buffered by the gate while looking for a token
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Provider siteverify endpoints
pub mod endpoints {
    /// Google reCAPTCHA
    pub const GOOGLE: &str = "https://www.google.com/recaptcha/api/siteverify";

    /// Cloudflare Turnstile
    pub const TURNSTILE: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
}

/// Environment variables consumed by the configuration layer
pub mod env {
    /// Selects the configuration source (`env` or `vault`)
    pub const CONFIG_PROVIDER: &str = "CONFIG_PROVIDER";

    /// Path of the JSON policy document
    pub const CAPTCHA_CONFIG: &str = "CAPTCHA_CONFIG";

    /// Vault server address
    pub const VAULT_ADDR: &str = "VAULT_ADDR";

    /// Vault access token
    pub const VAULT_TOKEN: &str = "VAULT_TOKEN";

    /// Vault KV v2 mount path
    pub const VAULT_PATH: &str = "VAULT_PATH";

    /// Mount used when `VAULT_PATH` is unset
    pub const DEFAULT_VAULT_MOUNT: &str = "secret";
}

/// Where the gate looks for a challenge token
pub mod token_fields {
    /// Header carrying the token (checked first)
    pub const HEADER: &str = "X-Captcha-Token";

    /// Form fields, in lookup order
    pub const FORM: [&str; 3] = ["cf-turnstile-response", "g-recaptcha-response", "token"];

    /// JSON body field
    pub const JSON: &str = "token";
}
