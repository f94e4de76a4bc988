//! HTTP surface: `/health` plus the MCP session router

mod auth;
mod handlers;
mod routes;

pub use handlers::{HealthResponse, UpstreamHealth};
pub use routes::{create_router, AppState};
