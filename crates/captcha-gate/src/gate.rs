//! Request gate: axum middleware that verifies a CAPTCHA token before the
//! wrapped handler runs.
//!
//! ```text
//! request → extract token → CaptchaService::verify_within → next handler
//!                 ↓ none                  ↓ failed
//!           token_missing          FailureHandler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::{ConnectInfo, FromRequest, Multipart, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use captcha_common::VerificationResult;
use captcha_common::constants::{DEFAULT_BODY_LIMIT_BYTES, DEFAULT_VERIFY_TIMEOUT_MS, token_fields};
use serde_json::Value;

use crate::service::CaptchaService;

/// Renders a rejected verification
pub type FailureHandler = Arc<dyn Fn(VerificationResult) -> Response + Send + Sync>;

/// Render failures as the JSON result with `status`
pub fn json_failure_handler(status: StatusCode) -> FailureHandler {
    Arc::new(move |result| (status, Json(result)).into_response())
}

/// Gate settings for one protected action
#[derive(Clone)]
pub struct CaptchaGate {
    service: Arc<CaptchaService>,
    action: Arc<str>,
    timeout: Duration,
    body_limit: usize,
    on_failure: FailureHandler,
}

impl CaptchaGate {
    pub fn new(service: Arc<CaptchaService>, action: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            action: action.into(),
            timeout: Duration::from_millis(DEFAULT_VERIFY_TIMEOUT_MS),
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
            on_failure: json_failure_handler(StatusCode::BAD_REQUEST),
        }
    }

    /// Deadline for the whole verification attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Largest body buffered while looking for a token
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.on_failure = handler;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Middleware for `axum::middleware::from_fn_with_state(gate, require_captcha)`
///
/// A header token leaves the body unread; otherwise the body is buffered up
/// to the gate's limit and searched.
pub async fn require_captcha(
    State(gate): State<CaptchaGate>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let (token, body) = match header_token(&parts.headers) {
        Some(token) => (Some(token), body),
        None => {
            let bytes = match to_bytes(body, gate.body_limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(action = %gate.action, error = %e, "Request body rejected");
                    return StatusCode::PAYLOAD_TOO_LARGE.into_response();
                }
            };
            let token = extract_token(&parts.headers, parts.uri.query(), &bytes).await;
            (token, Body::from(bytes))
        }
    };

    let Some(token) = token else {
        return (gate.on_failure)(VerificationResult::token_missing());
    };

    let remote_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let result = gate
        .service
        .verify_within(gate.timeout, &token, &remote_ip, &gate.action)
        .await;
    if !result.success {
        return (gate.on_failure)(result);
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Find the challenge token on a request.
///
/// Lookup order: `X-Captcha-Token` header, then the form fields
/// `cf-turnstile-response`, `g-recaptcha-response`, `token` (urlencoded or
/// multipart body before query string), then a JSON body's `token`. Empty
/// values are skipped.
pub async fn extract_token(
    headers: &HeaderMap,
    query: Option<&str>,
    body: &Bytes,
) -> Option<String> {
    if let Some(token) = header_token(headers) {
        return Some(token);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let mut form = Vec::new();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        form.extend(parse_urlencoded(&String::from_utf8_lossy(body)));
    } else if content_type.starts_with("multipart/form-data") {
        form.extend(multipart_fields(content_type, body).await);
    }
    if let Some(query) = query {
        form.extend(parse_urlencoded(query));
    }
    for field in token_fields::FORM {
        if let Some((_, value)) = form.iter().find(|(k, v)| k == field && !v.is_empty()) {
            return Some(value.clone());
        }
    }

    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get(token_fields::JSON)?
        .as_str()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(token_fields::HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Token-named text parts of a multipart body; other parts are skipped unread
async fn multipart_fields(content_type: &str, body: &Bytes) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let Ok(request) = axum::http::Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.clone()))
    else {
        return fields;
    };
    let Ok(mut multipart) = Multipart::from_request(request, &()).await else {
        return fields;
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if !token_fields::FORM.contains(&name.as_str()) {
            continue;
        }
        match field.text().await {
            Ok(value) => fields.push((name, value)),
            Err(e) => tracing::debug!(field = %name, error = %e, "Unreadable multipart field"),
        }
    }
    fields
}

fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode_component(key)?, decode_component(value)?))
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}
