//! HTTP route handlers for the Captcha Gate sidecar.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::gate::require_captcha;
use crate::state::AppState;

mod health;
mod verify;

/// Actions served under `/api/{action}`, fixed when the router is built
#[derive(Clone)]
struct ProtectedActions {
    state: AppState,
    declared: Arc<HashSet<String>>,
}

/// Create the main application router.
///
/// Every declared action is reachable as `POST /api/{action}` behind the
/// gate, so a deployment can be exercised end to end. Action names travel
/// as a percent-encoded path segment; undeclared names answer 404.
pub fn create_router<S: AsRef<str>>(state: AppState, actions: &[S]) -> Router {
    let protected = ProtectedActions {
        state: state.clone(),
        declared: Arc::new(actions.iter().map(|a| a.as_ref().to_string()).collect()),
    };

    Router::new()
        // Health
        .route("/health", get(health::health_check))

        // Verification surface
        .route("/verify", post(verify::verify_token))
        .route("/metadata/{action}", get(verify::action_metadata))

        // Gated demo endpoints
        .route(
            "/api/{action}",
            post(verify::protected_action)
                .route_layer(middleware::from_fn_with_state(protected, gate_declared_action)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the request through the gate for the action named in the path
async fn gate_declared_action(
    State(protected): State<ProtectedActions>,
    Path(action): Path<String>,
    request: Request,
    next: Next,
) -> Response {
    if !protected.declared.contains(&action) {
        tracing::debug!(action = %action, "Request for undeclared action");
        return StatusCode::NOT_FOUND.into_response();
    }
    require_captcha(State(protected.state.gate(&action)), request, next).await
}
