//! Tool arguments and result wrapping
//!
//! The argument structs are the tools' input schemas: field docs become the
//! schema descriptions and external names are camelCase. Each converts into
//! the client's request type. Results and failures are wrapped here so the
//! HTTP and stdio transports answer identically.

use rmcp::model::{CallToolResult, Content};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::types::{
    ExecuteRequest, GetParametersRequest, JobStateRequest, LambdaExecuteRequest, ParameterUpdate,
    UpdateParametersRequest,
};

// Tool argument types

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflowArgs {
    /// Project path on the platform, e.g. `/Sales/Forecast.iox`
    pub project_path: String,
    /// Only execute these blocks (default: every block)
    pub blocks: Option<Vec<String>>,
    /// Reload source data before executing
    pub refresh_from_source: Option<bool>,
    /// Cancel an execution already running on the project
    pub cancel_existing: Option<bool>,
    /// Validate and report the request, do not execute
    pub dry_run: Option<bool>,
    /// Alternative platform base URL; must be registered on the server
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LambdaExecuteWorkflowArgs {
    /// Project path on the platform, e.g. `/Sales/Forecast.iox`
    pub project_path: String,
    /// Only execute these blocks (default: every block)
    pub blocks: Option<Vec<String>>,
    /// Reload source data before executing
    pub refresh_from_source: Option<bool>,
    /// Cancel an execution already running on the project
    pub cancel_existing: Option<bool>,
    /// Parameter overrides applied to the temporary copy, keyed by name
    pub params: Option<Map<String, Value>>,
    /// Delete the temporary copy once the job finishes
    pub delete_execution_on_finish: Option<bool>,
    /// Validate and report the request, do not execute
    pub dry_run: Option<bool>,
    /// Alternative platform base URL; must be registered on the server
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetJobStateArgs {
    /// Project path the job was started on (for lambda runs, the original project)
    pub project_path: String,
    /// Job id returned by an execute call
    pub job_id: String,
    /// Alternative platform base URL; must be registered on the server
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetParametersArgs {
    /// Project path on the platform
    pub project_path: String,
    /// Read a single parameter (default: all parameters)
    pub name: Option<String>,
    /// Alternative platform base URL; must be registered on the server
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParametersArgs {
    /// Project path on the platform
    pub project_path: String,
    /// Parameters to set; at least one
    pub updates: Vec<ParameterUpdate>,
    /// Validate and report the request, do not apply it
    pub dry_run: Option<bool>,
    /// Alternative platform base URL; must be registered on the server
    pub base_url: Option<String>,
}

impl From<ExecuteWorkflowArgs> for ExecuteRequest {
    fn from(args: ExecuteWorkflowArgs) -> Self {
        Self {
            project_path: args.project_path,
            blocks: args.blocks,
            refresh_from_source: args.refresh_from_source,
            cancel_existing: args.cancel_existing,
            dry_run: args.dry_run.unwrap_or(false),
            base_url: args.base_url,
        }
    }
}

impl From<LambdaExecuteWorkflowArgs> for LambdaExecuteRequest {
    fn from(args: LambdaExecuteWorkflowArgs) -> Self {
        Self {
            project_path: args.project_path,
            blocks: args.blocks,
            refresh_from_source: args.refresh_from_source,
            cancel_existing: args.cancel_existing,
            params: args.params,
            delete_execution_on_finish: args.delete_execution_on_finish,
            dry_run: args.dry_run.unwrap_or(false),
            base_url: args.base_url,
        }
    }
}

impl From<GetJobStateArgs> for JobStateRequest {
    fn from(args: GetJobStateArgs) -> Self {
        Self {
            project_path: args.project_path,
            job_id: args.job_id,
            base_url: args.base_url,
        }
    }
}

impl From<GetParametersArgs> for GetParametersRequest {
    fn from(args: GetParametersArgs) -> Self {
        Self {
            project_path: args.project_path,
            name: args.name,
            base_url: args.base_url,
        }
    }
}

impl From<UpdateParametersArgs> for UpdateParametersRequest {
    fn from(args: UpdateParametersArgs) -> Self {
        Self {
            project_path: args.project_path,
            updates: args.updates,
            dry_run: args.dry_run.unwrap_or(false),
            base_url: args.base_url,
        }
    }
}

// Results

pub(crate) fn payload<T: Serialize>(outcome: Result<T>) -> Result<Value> {
    Ok(serde_json::to_value(outcome?)?)
}

/// Operation failures become tool results with `isError` set; only argument
/// shape errors are protocol errors, and rmcp raises those before we run.
pub fn tool_result(outcome: &Result<Value>) -> CallToolResult {
    match outcome {
        Ok(Value::String(s)) => CallToolResult::success(vec![Content::text(s.clone())]),
        Ok(value) => {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            CallToolResult::success(vec![Content::text(text)])
        }
        Err(e) => CallToolResult::error(vec![Content::text(format!("Error: {}", e))]),
    }
}

/// Per-call record used for the before/after log lines.
pub(crate) struct ToolInvocation {
    tool_name: &'static str,
    session: Option<String>,
    started_at: Instant,
}

impl ToolInvocation {
    pub(crate) fn begin<A: Serialize>(tool_name: &'static str, args: &A, session: Option<String>) -> Self {
        let args = serde_json::to_string(args).unwrap_or_default();
        tracing::info!(
            tool = tool_name,
            session = session.as_deref().unwrap_or("-"),
            args = %args,
            "Tool call started"
        );
        Self {
            tool_name,
            session,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn finish(self, error: Option<&Error>) {
        let duration_ms = self.started_at.elapsed().as_millis() as u64;
        let session = self.session.as_deref().unwrap_or("-");
        match error {
            None => tracing::info!(tool = self.tool_name, session, duration_ms, "Tool call succeeded"),
            Some(e) if e.is_validation() => {
                tracing::info!(tool = self.tool_name, session, duration_ms, error = %e, "Tool call rejected")
            }
            Some(e) => tracing::warn!(tool = self.tool_name, session, duration_ms, error = %e, "Tool call failed"),
        }
    }
}
