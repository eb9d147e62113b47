//! Test fixtures: an in-process siteverify stand-in and policy files on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::{Form, Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Policy with one declared action and a score floor of 0.5
pub const LOGIN_POLICY: &str = r#"{
    "provider": "google",
    "global": {"min_score": 0.5, "site_key": "sk", "secret_key": "SECRET", "theme": "light"},
    "actions": {"login": {}}
}"#;

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: Value,
    delay: Duration,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn siteverify(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.forms.lock().await.push(form);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.body.clone()))
}

/// Siteverify endpoint answering every request with a fixed body
pub struct MockProvider {
    base: String,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl MockProvider {
    pub async fn spawn(body: Value) -> Self {
        Self::start(StatusCode::OK, body, Duration::ZERO).await
    }

    pub async fn spawn_status(status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        Self::start(status, Value::Null, Duration::ZERO).await
    }

    pub async fn spawn_delayed(body: Value, delay: Duration) -> Self {
        Self::start(StatusCode::OK, body, delay).await
    }

    async fn start(status: StatusCode, body: Value, delay: Duration) -> Self {
        let forms = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            body,
            delay,
            forms: forms.clone(),
        };
        let router = Router::new()
            .route("/siteverify", post(siteverify))
            .with_state(state);

        Self {
            base: spawn_server(router).await,
            forms,
        }
    }

    pub fn url(&self) -> String {
        format!("{}/siteverify", self.base)
    }

    pub async fn last_form(&self) -> Option<HashMap<String, String>> {
        self.forms.lock().await.last().cloned()
    }

    pub async fn calls(&self) -> usize {
        self.forms.lock().await.len()
    }
}

/// Write a policy document into `dir`
pub fn write_policy(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("captcha.json");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Move the file's modification time `secs` seconds into the future
pub fn bump_modified(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}
