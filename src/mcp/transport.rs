//! HTTP transport on `/mcp`
//!
//! rmcp's `StreamableHttpService` speaks the protocol; `SessionTable` is its
//! session manager. `guard_sessions` runs first and turns session mistakes
//! into JSON-RPC errors, which rmcp would otherwise answer with bare status
//! codes:
//!
//! * no `mcp-session-id` on a non-initialize request: -32000
//! * an id that is not (or no longer) open: -32001
//! * `initialize` on a live session: -32600
//! * a body that is not JSON: -32700

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use rmcp::model::{ErrorCode, ErrorData};
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::server::WorkflowServer;
use super::session::SessionTable;
use crate::upstream::WorkflowClient;

pub const SESSION_HEADER: &str = "mcp-session-id";

pub const MISSING_SESSION: i32 = -32000;
pub const SESSION_NOT_FOUND: i32 = -32001;

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// `/mcp` routes. Every session gets its own `WorkflowServer` over a shared
/// client; cancelling `shutdown` ends all open streams.
pub fn routes(client: WorkflowClient, sessions: Arc<SessionTable>, shutdown: CancellationToken) -> Router {
    let config = StreamableHttpServerConfig {
        cancellation_token: shutdown,
        ..Default::default()
    };

    let mcp_service = StreamableHttpService::new(
        move || Ok(WorkflowServer::new(client.clone())),
        sessions.clone(),
        config,
    );

    Router::new()
        .nest_service("/mcp", mcp_service)
        .route_layer(middleware::from_fn_with_state(sessions, guard_sessions))
}

fn reject(status: StatusCode, id: Value, code: i32, message: &'static str, data: Option<Value>) -> Response {
    tracing::debug!(code, reason = message, "Rejected MCP request");
    let error = ErrorData::new(ErrorCode(code), message, data);
    (status, Json(json!({ "jsonrpc": "2.0", "id": id, "error": error }))).into_response()
}

fn unknown_session(id: Value, session_id: &str) -> Response {
    reject(
        StatusCode::NOT_FOUND,
        id,
        SESSION_NOT_FOUND,
        "Session not found",
        Some(json!({ "sessionId": session_id })),
    )
}

fn missing_session(id: Value) -> Response {
    reject(
        StatusCode::BAD_REQUEST,
        id,
        MISSING_SESSION,
        "Bad Request: No valid session ID provided",
        None,
    )
}

/// `Ok(None)` when absent or blank, `Err` when not valid UTF-8.
fn session_header(request: &Request) -> Result<Option<String>, Response> {
    match request.headers().get(SESSION_HEADER) {
        None => Ok(None),
        Some(raw) => raw
            .to_str()
            .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
            .map_err(|_| {
                reject(
                    StatusCode::BAD_REQUEST,
                    Value::Null,
                    ErrorCode::INVALID_REQUEST.0,
                    "mcp-session-id header must be valid UTF-8",
                    None,
                )
            }),
    }
}

pub async fn guard_sessions(State(sessions): State<Arc<SessionTable>>, request: Request, next: Next) -> Response {
    let session_id = match session_header(&request) {
        Ok(id) => id,
        Err(rejection) => return rejection,
    };

    if request.method() != Method::POST {
        // GET and DELETE address an existing session; anything else is
        // left to rmcp's 405.
        if request.method() == Method::GET || request.method() == Method::DELETE {
            let Some(sid) = session_id.as_deref() else {
                return missing_session(Value::Null);
            };
            if !sessions.contains(sid).await {
                return unknown_session(Value::Null, sid);
            }
        }
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                Value::Null,
                ErrorCode::INVALID_REQUEST.0,
                "Request body too large",
                None,
            )
        }
    };

    let message: Value = match serde_json::from_slice(&bytes) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse JSON-RPC payload: {}", e);
            return reject(StatusCode::BAD_REQUEST, Value::Null, ErrorCode::PARSE_ERROR.0, "Parse error", None);
        }
    };
    if message.is_array() {
        return reject(
            StatusCode::BAD_REQUEST,
            Value::Null,
            ErrorCode::INVALID_REQUEST.0,
            "Batch requests are not supported",
            None,
        );
    }

    let id = message.get("id").cloned().unwrap_or(Value::Null);
    if message.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return reject(
            StatusCode::BAD_REQUEST,
            id,
            ErrorCode::INVALID_REQUEST.0,
            "Invalid Request: jsonrpc must be \"2.0\"",
            None,
        );
    }
    let is_initialize = message.get("method").and_then(Value::as_str) == Some("initialize");

    match session_id.as_deref() {
        None if !is_initialize => return missing_session(id),
        None => {}
        Some(sid) => {
            if !sessions.contains(sid).await {
                return unknown_session(id, sid);
            }
            if is_initialize {
                return reject(
                    StatusCode::BAD_REQUEST,
                    id,
                    ErrorCode::INVALID_REQUEST.0,
                    "Invalid Request: Server already initialized",
                    None,
                );
            }
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
