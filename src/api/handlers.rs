//! API request handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use super::routes::AppState;
use crate::types::GetParametersRequest;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub version: String,
    /// Open MCP sessions
    pub sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamHealth>,
}

/// Result of the optional upstream check
#[derive(Debug, Serialize)]
pub struct UpstreamHealth {
    pub ok: bool,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Health check endpoint. Checks the platform with one parameter read when a
/// health-check project is configured.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = state.sessions.len().await;

    let upstream = match &state.config.http.health_check_project {
        Some(project) => Some(check_upstream(&state, project).await),
        None => None,
    };
    let healthy = upstream.as_ref().map_or(true, |u| u.ok);

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions,
        upstream,
    };
    (status, Json(body))
}

async fn check_upstream(state: &AppState, project: &str) -> UpstreamHealth {
    let started = Instant::now();
    let result = state
        .client
        .get_parameters(GetParametersRequest {
            project_path: project.to_string(),
            name: None,
            base_url: None,
        })
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(_) => UpstreamHealth {
            ok: true,
            project: project.to_string(),
            error: None,
            elapsed_ms,
        },
        Err(e) => {
            tracing::warn!(project, error = %e, "Upstream health check failed");
            UpstreamHealth {
                ok: false,
                project: project.to_string(),
                error: Some(e.to_string()),
                elapsed_ms,
            }
        }
    }
}
