//! Verification and widget metadata endpoints.

use std::net::SocketAddr;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
};
use captcha_common::{ActionMetadata, VerificationResult};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct VerifyRequest {
    token: String,
    action: String,
    /// Client address as seen by the calling application
    remote_ip: Option<String>,
}

/// Verify a token on behalf of another service
pub async fn verify_token(
    State(state): State<AppState>,
    connect: Option<Extension<ConnectInfo<SocketAddr>>>,
    Json(payload): Json<VerifyRequest>,
) -> (StatusCode, Json<VerificationResult>) {
    if payload.token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(VerificationResult::token_missing()));
    }

    let remote_ip = payload
        .remote_ip
        .or_else(|| connect.map(|Extension(ConnectInfo(addr))| addr.ip().to_string()))
        .unwrap_or_default();

    let result = state
        .service
        .verify_within(
            state.config.verify_timeout(),
            &payload.token,
            &remote_ip,
            &payload.action,
        )
        .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result))
}

/// Widget settings for rendering a challenge
pub async fn action_metadata(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> Result<Json<ActionMetadata>, (StatusCode, String)> {
    state.service.metadata(&action).await.map(Json).map_err(|e| {
        tracing::error!(action = %action, error = %e, "Failed to load captcha metadata");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to load captcha metadata: {e}"),
        )
    })
}

#[derive(Serialize)]
pub struct ProtectedResponse {
    success: bool,
    action: String,
}

/// Reached only after the gate accepted the request
pub async fn protected_action(Path(action): Path<String>) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        success: true,
        action,
    })
}
