//! MCP server implementation
//!
//! One `WorkflowServer` serves either stdio or a single HTTP session. The
//! tool methods validate through rmcp's `Parameters` extractor, call the
//! Workflow client and wrap the outcome as a tool result.

use axum::http::request::Parts;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, RoleServer, ServerHandler, ServiceExt};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

use super::tools::{
    payload, tool_result, ExecuteWorkflowArgs, GetJobStateArgs, GetParametersArgs,
    LambdaExecuteWorkflowArgs, ToolInvocation, UpdateParametersArgs,
};
use super::transport::SESSION_HEADER;
use crate::upstream::WorkflowClient;

const INSTRUCTIONS: &str = "Run and inspect workflows on the BI platform. Use execute_workflow or lambda_execute_workflow to start a job, get_job_state to follow it, and get_parameters / update_parameters to read or change workflow parameters. Pass dryRun to preview a mutating call.";

/// MCP server for the Workflow API
#[derive(Clone)]
pub struct WorkflowServer {
    client: WorkflowClient,
    log_calls: bool,
    tool_router: ToolRouter<Self>,
}

/// Session id of the HTTP request carrying this call; `None` on stdio.
fn session_of(ctx: &RequestContext<RoleServer>) -> Option<String> {
    ctx.extensions
        .get::<Parts>()
        .and_then(|parts| parts.headers.get(SESSION_HEADER))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tool_router]
impl WorkflowServer {
    pub fn new(client: WorkflowClient) -> Self {
        let log_calls = client.config().log_tool_calls;
        Self {
            client,
            log_calls,
            tool_router: Self::tool_router(),
        }
    }

    async fn run<A, F>(
        &self,
        tool: &'static str,
        args: &A,
        ctx: &RequestContext<RoleServer>,
        call: F,
    ) -> std::result::Result<CallToolResult, ErrorData>
    where
        A: Serialize,
        F: Future<Output = crate::error::Result<Value>>,
    {
        let invocation = self
            .log_calls
            .then(|| ToolInvocation::begin(tool, args, session_of(ctx)));
        let outcome = call.await;
        if let Some(invocation) = invocation {
            invocation.finish(outcome.as_ref().err());
        }
        Ok(tool_result(&outcome))
    }

    #[tool(description = "Execute a project's workflow. Returns the upstream job id; poll it with get_job_state. Set dryRun to preview the request without executing.")]
    async fn execute_workflow(
        &self,
        Parameters(args): Parameters<ExecuteWorkflowArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let call = self.client.execute(args.clone().into());
        self.run("execute_workflow", &args, &ctx, async { payload(call.await) })
            .await
    }

    #[tool(description = "Execute a workflow on a temporary, isolated copy of the project with optional parameter overrides. Returns the job id and the lambda project path.")]
    async fn lambda_execute_workflow(
        &self,
        Parameters(args): Parameters<LambdaExecuteWorkflowArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let call = self.client.lambda_execute(args.clone().into());
        self.run("lambda_execute_workflow", &args, &ctx, async { payload(call.await) })
            .await
    }

    #[tool(description = "Get the state of a workflow job (QUEUED, RUNNING, BLOCKED, COMPLETED, FAILED, CANCELLED or whatever the platform reports), with error details when it failed.")]
    async fn get_job_state(
        &self,
        Parameters(args): Parameters<GetJobStateArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let call = self.client.job_state(args.clone().into());
        self.run("get_job_state", &args, &ctx, call).await
    }

    #[tool(description = "Read all workflow parameters of a project, or a single parameter by name.")]
    async fn get_parameters(
        &self,
        Parameters(args): Parameters<GetParametersArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let call = self.client.get_parameters(args.clone().into());
        self.run("get_parameters", &args, &ctx, call).await
    }

    #[tool(description = "Update one or more workflow parameters of a project. Set dryRun to preview the update without applying it.")]
    async fn update_parameters(
        &self,
        Parameters(args): Parameters<UpdateParametersArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let call = self.client.update_parameters(args.clone().into());
        self.run("update_parameters", &args, &ctx, async { payload(call.await) })
            .await
    }
}

#[tool_handler]
impl ServerHandler for WorkflowServer {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::default(),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "workflow-mcp".into(),
                title: Some("Workflow MCP".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.into()),
        }
    }
}

/// Run the MCP server on stdio
pub async fn serve_stdio(server: WorkflowServer) -> anyhow::Result<()> {
    tracing::info!("Starting MCP server on stdio...");
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
