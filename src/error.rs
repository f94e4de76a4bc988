//! Error types for workflow-mcp

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid project path: {0}")]
    InvalidProjectPath(String),

    #[error("Project path not allowed: {path} (allowed prefixes: {allowed})")]
    ProjectNotAllowed { path: String, allowed: String },

    #[error("Base URL not allowed: {0}")]
    BaseUrlNotAllowed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures raised before any upstream request was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidProjectPath(_)
                | Error::ProjectNotAllowed { .. }
                | Error::BaseUrlNotAllowed(_)
                | Error::InvalidArguments(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
