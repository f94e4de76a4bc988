//! Shared fixtures: an in-process mock of the platform's Workflow API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use workflow_mcp::config::{FileConfig, ServerConfig};
use workflow_mcp::upstream::WorkflowClient;

/// Project whose calls the mock answers slowly
pub const SLOW_PROJECT: &str = "/mcptest/slow.iox";
/// Project whose calls the mock answers with a 500
pub const BROKEN_PROJECT: &str = "/mcptest/broken.iox";
/// Project whose calls the mock answers with 204 and no body
pub const EMPTY_PROJECT: &str = "/mcptest/empty.iox";
/// Project whose jobs report a state outside the documented set
pub const PAUSED_PROJECT: &str = "/mcptest/paused.iox";

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
struct MockState {
    log: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockUpstream {
    pub base_url: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = MockState::default();
        let log = state.log.clone();
        let app = Router::new().fallback(respond).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().expect("No local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock upstream failed");
        });

        Self {
            base_url: format!("http://{}", addr),
            log,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body_json = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    state.log.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body_json,
    });

    if path.starts_with(SLOW_PROJECT) {
        tokio::time::sleep(Duration::from_millis(800)).await;
    }
    if path.starts_with(BROKEN_PROJECT) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Workflow engine unavailable" })),
        )
            .into_response();
    }
    if path.starts_with(EMPTY_PROJECT) {
        return StatusCode::NO_CONTENT.into_response();
    }
    if path.starts_with(PAUSED_PROJECT) && path.ends_with("/state") {
        return Json(json!({ "jobState": "PAUSED", "pausedBy": "operator" })).into_response();
    }

    if path.ends_with("/w/lambda/execute") {
        Json(json!({ "jobId": "job-lambda-1", "lambdaProjectPath": "/lambda/abc/demo.iox" })).into_response()
    } else if path.ends_with("/w/execute") {
        Json(json!({ "jobId": "job-1" })).into_response()
    } else if path.contains("/w/job/") && path.ends_with("/state") {
        Json(json!({ "jobState": "COMPLETED", "progress": 100 })).into_response()
    } else if path.ends_with("/w/updateparams") {
        StatusCode::NO_CONTENT.into_response()
    } else if path.ends_with("/w/param") {
        Json(json!({ "region": "emea", "limit": 10 })).into_response()
    } else if path.contains("/w/param/") {
        Json(json!({ "name": "region", "value": "emea" })).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "no such endpoint" }))).into_response()
    }
}

/// Build a config from the given variables only; the process environment is
/// never consulted.
pub fn config_from(vars: &[(&str, &str)]) -> workflow_mcp::Result<ServerConfig> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ServerConfig::from_lookup(FileConfig::default(), |key| vars.get(key).cloned())
}

pub fn client_for(base_url: &str, extra: &[(&str, &str)]) -> WorkflowClient {
    let mut vars = vec![("WORKFLOW_BASE_URL", base_url)];
    vars.extend_from_slice(extra);
    let config = config_from(&vars).expect("Invalid test config");
    WorkflowClient::new(Arc::new(config)).expect("Failed to build client")
}
