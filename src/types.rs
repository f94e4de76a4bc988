//! Core types for workflow-mcp
//!
//! Request bodies mirror the platform's Workflow REST API. Optional fields
//! are skipped when unset so they never reach the wire as `null`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Arguments for `POST {project}/w/execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(skip)]
    pub project_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_from_source: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_existing: Option<bool>,

    #[serde(skip)]
    pub dry_run: bool,

    #[serde(skip)]
    pub base_url: Option<String>,
}

/// Arguments for `POST {project}/w/lambda/execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaExecuteRequest {
    #[serde(skip)]
    pub project_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_from_source: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_existing: Option<bool>,

    /// Workflow parameter overrides applied to the lambda copy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_execution_on_finish: Option<bool>,

    #[serde(skip)]
    pub dry_run: bool,

    #[serde(skip)]
    pub base_url: Option<String>,
}

/// A single `{name, value}` entry for `POST {project}/w/updateparams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterUpdate {
    /// Parameter name as defined in the project
    pub name: String,
    /// New value; any JSON type the parameter accepts
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateParametersRequest {
    #[serde(skip)]
    pub project_path: String,

    pub updates: Vec<ParameterUpdate>,

    #[serde(skip)]
    pub dry_run: bool,

    #[serde(skip)]
    pub base_url: Option<String>,
}

/// Lifecycle state of an upstream job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Read `jobState` from a job-state payload. States this build does not
    /// know about yield `None`; the payload itself is relayed untouched.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        payload.get("jobState")?.as_str()?.parse().ok()
    }

    /// True once the job will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Blocked => "BLOCKED",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "BLOCKED" => Ok(JobState::Blocked),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            "CANCELLED" => Ok(JobState::Cancelled),
            other => Err(format!("unknown job state {:?}", other)),
        }
    }
}

/// What a mutating call would have sent, returned instead of calling out
/// when `dry_run` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunPreview {
    pub dry_run: bool,
    pub action: String,
    pub method: String,
    pub url: String,
    pub project_path: String,
    pub base_url: String,
    pub body: Value,
}

/// Outcome of a mutating call: either the upstream payload, relayed as
/// received, or a preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submitted<T> {
    DryRun(DryRunPreview),
    Sent(T),
}

impl<T> Submitted<T> {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Submitted::DryRun(_))
    }
}

/// Arguments for `GET {project}/w/job/{job_id}/state`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStateRequest {
    pub project_path: String,
    pub job_id: String,
    pub base_url: Option<String>,
}

/// Arguments for `GET {project}/w/param[/{name}]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetParametersRequest {
    pub project_path: String,
    /// Single parameter to read; all parameters when unset
    pub name: Option<String>,
    pub base_url: Option<String>,
}
