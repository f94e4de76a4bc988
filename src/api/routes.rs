//! Router assembly

use axum::http::{header, HeaderName, Method, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rmcp::model::ErrorData;
use serde_json::{json, Value};
use std::any::Any as PanicPayload;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{auth, handlers};
use crate::config::ServerConfig;
use crate::mcp::transport::{self, SESSION_HEADER};
use crate::mcp::SessionTable;
use crate::upstream::WorkflowClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub client: WorkflowClient,
    pub sessions: Arc<SessionTable>,
    /// Cancelled on shutdown; ends every open MCP stream
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(client: WorkflowClient) -> Self {
        let config = Arc::new(client.config().clone());
        let sessions = Arc::new(SessionTable::new(config.http.session_idle_timeout));
        Self {
            config,
            client,
            sessions,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Create the HTTP router. `/health` is never behind the Basic gate.
pub fn create_router(state: AppState) -> Router {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("last-event-id"),
            HeaderName::from_static("mcp-protocol-version"),
            session_header.clone(),
        ])
        .expose_headers([session_header]);

    let mut mcp = transport::routes(state.client.clone(), state.sessions.clone(), state.shutdown.clone());
    if let Some(credentials) = state.config.http.basic_auth.clone() {
        tracing::info!(username = %credentials.username, "HTTP Basic gate enabled on /mcp");
        mcp = mcp.route_layer(from_fn_with_state(Arc::new(credentials), auth::require_basic_auth));
    }

    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
        .merge(mcp)
        .layer(CatchPanicLayer::custom(internal_error))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// A panicking handler answers with a JSON-RPC internal error.
fn internal_error(panic: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Handler panicked");

    let error = ErrorData::internal_error("Internal error", None);
    let body = json!({ "jsonrpc": "2.0", "id": Value::Null, "error": error });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
