//! Workflow API client

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

use super::auth::authorization_header;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{
    DryRunPreview, ExecuteRequest, GetParametersRequest, JobState, JobStateRequest,
    LambdaExecuteRequest, Submitted, UpdateParametersRequest,
};

/// One resolved upstream endpoint.
struct Target {
    project_path: String,
    base_url: Url,
    url: Url,
}

impl Target {
    fn preview<B: Serialize>(&self, action: &str, method: Method, body: &B) -> Result<DryRunPreview> {
        Ok(DryRunPreview {
            dry_run: true,
            action: action.to_string(),
            method: method.to_string(),
            url: self.url.to_string(),
            project_path: self.project_path.clone(),
            base_url: self.base_url.to_string(),
            body: serde_json::to_value(body)?,
        })
    }
}

/// Thin client over the Workflow endpoints. Cheap to clone.
#[derive(Clone)]
pub struct WorkflowClient {
    config: Arc<ServerConfig>,
    http: Client,
}

impl WorkflowClient {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("workflow-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start a workflow execution. The upstream reply (normally `{jobId}`) is
    /// relayed as received.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<Submitted<Value>> {
        let target = self.target(&request.project_path, request.base_url.as_deref(), &["w", "execute"])?;
        if request.dry_run {
            return Ok(Submitted::DryRun(target.preview("execute", Method::POST, &request)?));
        }

        let body = serde_json::to_value(&request)?;
        let response = self.send(Method::POST, &target.url, Some(&body)).await?;
        log_job_id(&target, &response);
        Ok(Submitted::Sent(response))
    }

    /// Run the workflow on a temporary copy of the project.
    pub async fn lambda_execute(
        &self,
        request: LambdaExecuteRequest,
    ) -> Result<Submitted<Value>> {
        let target = self.target(
            &request.project_path,
            request.base_url.as_deref(),
            &["w", "lambda", "execute"],
        )?;
        if request.dry_run {
            return Ok(Submitted::DryRun(target.preview("lambda_execute", Method::POST, &request)?));
        }

        let body = serde_json::to_value(&request)?;
        let response = self.send(Method::POST, &target.url, Some(&body)).await?;
        log_job_id(&target, &response);
        Ok(Submitted::Sent(response))
    }

    pub async fn job_state(&self, request: JobStateRequest) -> Result<Value> {
        let job_id = request.job_id.trim();
        if job_id.is_empty() {
            return Err(Error::InvalidArguments("jobId must not be empty".into()));
        }

        let target = self.target(
            &request.project_path,
            request.base_url.as_deref(),
            &["w", "job", job_id, "state"],
        )?;
        let response = self.send(Method::GET, &target.url, None).await?;
        match JobState::from_payload(&response) {
            Some(state) => tracing::debug!(job_id, %state, terminal = state.is_terminal(), "Job state"),
            None => tracing::debug!(job_id, "Job state not recognised, relaying as is"),
        }
        Ok(response)
    }

    /// Read every parameter of a project, or a single one by name.
    pub async fn get_parameters(&self, request: GetParametersRequest) -> Result<Value> {
        let mut tail = vec!["w", "param"];
        if let Some(name) = request.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidArguments("parameter name must not be empty".into()));
            }
            tail.push(name);
        }

        let target = self.target(&request.project_path, request.base_url.as_deref(), &tail)?;
        self.send(Method::GET, &target.url, None).await
    }

    pub async fn update_parameters(&self, request: UpdateParametersRequest) -> Result<Submitted<Value>> {
        if request.updates.is_empty() {
            return Err(Error::InvalidArguments("updates must contain at least one entry".into()));
        }
        if let Some(update) = request.updates.iter().find(|u| u.name.trim().is_empty()) {
            return Err(Error::InvalidArguments(format!(
                "every update needs a parameter name (value: {})",
                update.value
            )));
        }

        let target = self.target(
            &request.project_path,
            request.base_url.as_deref(),
            &["w", "updateparams"],
        )?;
        if request.dry_run {
            return Ok(Submitted::DryRun(target.preview("update_parameters", Method::POST, &request)?));
        }

        let body = serde_json::to_value(&request)?;
        let response = self.send(Method::POST, &target.url, Some(&body)).await?;
        Ok(Submitted::Sent(response))
    }

    fn target(&self, project_path: &str, base_url: Option<&str>, tail: &[&str]) -> Result<Target> {
        let project_path = self.config.validate_project_path(project_path)?;
        let base_url = self.config.resolve_base_url(base_url)?;
        let url = endpoint_url(&base_url, &project_path, tail)?;
        Ok(Target {
            project_path,
            base_url,
            url,
        })
    }

    async fn send(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<Value> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(value) = authorization_header(&self.config.auth) {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let timeout = self.config.request_timeout;
        let started = Instant::now();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(%method, %url, timeout_ms = timeout.as_millis() as u64, "Upstream request timed out");
                return Err(Error::Timeout(timeout));
            }
        };

        tracing::debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream request finished"
        );

        if !status.is_success() {
            return Err(upstream_error(status, &bytes));
        }
        if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn log_job_id(target: &Target, response: &Value) {
    if let Some(job_id) = response.get("jobId").and_then(Value::as_str) {
        tracing::info!(project = %target.project_path, job_id, "Workflow job submitted");
    }
}

/// `{base}{project segments}{tail}` with every segment percent-encoded.
fn endpoint_url(base: &Url, project_path: &str, tail: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("base URL {} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(project_path.split('/').filter(|s| !s.is_empty()))
        .extend(tail);
    Ok(url)
}

fn upstream_error(status: StatusCode, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| error_message(&value))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());
    Error::Upstream {
        status: status.as_u16(),
        message,
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["message", "error", "errorMessage"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(nested @ Value::Object(_)) => nested
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        })
}
