//! MCP layer: tools, session table and transports

pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use server::WorkflowServer;
pub use session::SessionTable;
pub use transport::SESSION_HEADER;
