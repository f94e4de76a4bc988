//! workflow-mcp - MCP server exposing a BI platform's Workflow API as tools

pub mod config;
pub mod error;
pub mod types;

pub mod upstream;
pub mod mcp;
pub mod api;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use types::*;
