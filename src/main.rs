//! workflow-mcp - MCP server exposing a BI platform's Workflow API as tools

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workflow_mcp::api::{self, AppState};
use workflow_mcp::config::ServerConfig;
use workflow_mcp::mcp::server::serve_stdio;
use workflow_mcp::mcp::WorkflowServer;
use workflow_mcp::types::GetParametersRequest;
use workflow_mcp::upstream::WorkflowClient;

#[derive(Parser)]
#[command(name = "workflow-mcp")]
#[command(about = "MCP server for the Workflow API of a BI platform")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (MCP at /mcp, health at /health)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,
    },

    /// Start the MCP server (stdio mode for desktop clients)
    Stdio,

    /// Read a project's parameters once to verify connectivity and credentials
    Check {
        /// Project path; defaults to the configured health-check project
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();

    // stdout belongs to the stdio transport
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("workflow_mcp={},tower_http={}", log_level, log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ServerConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.http.port = port;
            }
            if let Some(host) = host {
                config.http.host = host;
            }
            let addr = format!("{}:{}", config.http.host, config.http.port);
            let base_url = config.base_url.to_string();

            let client = WorkflowClient::new(Arc::new(config))?;
            let state = AppState::new(client);
            let sessions = state.sessions.clone();
            let shutdown = state.shutdown.clone();
            let router = api::create_router(state);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Starting HTTP server on {} (upstream {})", addr, base_url);
            println!("workflow-mcp running at http://{}", addr);
            println!("  MCP:    http://{}/mcp", addr);
            println!("  Health: http://{}/health", addr);

            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received");
                }
                signal.cancel();
            });

            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;

            let closed = sessions.clear().await;
            tracing::info!(sessions = closed, "Server stopped");
        }

        Commands::Stdio => {
            tracing::info!("Starting MCP server (stdio mode)");
            let client = WorkflowClient::new(Arc::new(config))?;
            let server = WorkflowServer::new(client);
            serve_stdio(server).await?;
        }

        Commands::Check { project } => {
            let project = project
                .or_else(|| config.http.health_check_project.clone())
                .ok_or_else(|| anyhow::anyhow!("No project given and MCP_HEALTH_CHECK_PROJECT is not set"))?;
            let client = WorkflowClient::new(Arc::new(config))?;

            let params = client
                .get_parameters(GetParametersRequest {
                    project_path: project.clone(),
                    name: None,
                    base_url: None,
                })
                .await?;

            println!("✓ Connected to {}", client.config().base_url);
            println!("Parameters of {}:", project);
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }

    Ok(())
}
