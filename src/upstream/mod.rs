//! Client for the platform's Workflow REST API

mod auth;
mod client;

pub use auth::authorization_header;
pub use client::WorkflowClient;
